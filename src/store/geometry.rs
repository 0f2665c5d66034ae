//! GeoJSON conversion and the geometric measures the memory store needs.

use geo::{
    Area, BooleanOps, BoundingRect, Closest, ClosestPoint, Coord, CoordsIter, Distance,
    Geometry, Haversine, Intersects, LineString, MultiPolygon, Point, Polygon,
};
use serde_json::{json, Value};

/// Parse a GeoJSON geometry object (Point, MultiPoint, Polygon, MultiPolygon).
pub fn from_geojson(value: &Value) -> Result<Geometry<f64>, String> {
    let kind = value["type"]
        .as_str()
        .ok_or_else(|| "geometry has no type".to_string())?;
    let coordinates = &value["coordinates"];

    match kind {
        "Point" => Ok(Geometry::Point(Point::from(parse_coord(coordinates)?))),
        "MultiPoint" => {
            let points = as_array(coordinates)?
                .iter()
                .map(|c| parse_coord(c).map(Point::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiPoint(points.into()))
        }
        "Polygon" => Ok(Geometry::Polygon(parse_polygon(coordinates)?)),
        "MultiPolygon" => {
            let polygons = as_array(coordinates)?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        other => Err(format!("unsupported geometry type '{}'", other)),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| "coordinates must be an array".to_string())
}

fn parse_coord(value: &Value) -> Result<Coord<f64>, String> {
    let pair = as_array(value)?;
    match (
        pair.first().and_then(Value::as_f64),
        pair.get(1).and_then(Value::as_f64),
    ) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err("position must hold two numbers".to_string()),
    }
}

fn parse_ring(value: &Value) -> Result<LineString<f64>, String> {
    let coords = as_array(value)?
        .iter()
        .map(parse_coord)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LineString::new(coords))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>, String> {
    let mut rings = as_array(value)?.iter().map(parse_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| "polygon has no exterior ring".to_string())??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_coords(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_coords(polygon: &Polygon<f64>) -> Value {
    let mut rings = vec![ring_coords(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_coords));
    Value::Array(rings)
}

/// Serialize to a GeoJSON geometry object. Unsupported kinds become null.
pub fn to_geojson(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": [p.x(), p.y()] }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.iter().map(|p| json!([p.x(), p.y()])).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_coords(p) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        _ => Value::Null,
    }
}

/// Areal view of a geometry, if it has area.
pub fn areal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        _ => None,
    }
}

pub fn intersection_area(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.intersection(b).unsigned_area()
}

/// Envelope as `([min_x, min_y], [max_x, max_y])`
pub fn envelope(geometry: &Geometry<f64>) -> Option<([f64; 2], [f64; 2])> {
    geometry
        .bounding_rect()
        .map(|rect| ([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

/// Great-circle distance in meters between the closest parts of two
/// lon/lat geometries; zero when they intersect.
pub fn distance_meters(a: &Geometry<f64>, b: &Geometry<f64>) -> f64 {
    if a.intersects(b) {
        return 0.0;
    }
    closest_from(a, b).min(closest_from(b, a))
}

/// Shortest distance from any vertex of `from` to the geometry `to`
fn closest_from(from: &Geometry<f64>, to: &Geometry<f64>) -> f64 {
    from.coords_iter()
        .filter_map(|coord| {
            let point = Point::from(coord);
            match to.closest_point(&point) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => {
                    Some(Haversine.distance(point, p))
                }
                Closest::Indeterminate => None,
            }
        })
        .fold(f64::INFINITY, f64::min)
}
