//! Compact geometry-exchange output for a merged row set.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::FormatError;
use crate::models::ResultRow;

/// Coordinate precision and optional grid quantization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopologyOptions {
    /// Decimal places kept on output coordinates
    pub precision: u32,
    /// Grid steps per axis; coordinates become integers with a transform
    pub quantization: Option<f64>,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            precision: 6,
            quantization: None,
        }
    }
}

/// Decimal places beyond what an f64 coordinate can carry
pub const MAX_PRECISION: u32 = 15;

/// Turns rows carrying a `geometry` into a topology payload.
pub trait TopologySerializer: Send + Sync {
    fn serialize(&self, rows: &[ResultRow], options: &TopologyOptions) -> Result<Value, FormatError>;
}

/// Feature collection with rounded, optionally grid-quantized coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizedSerializer;

struct Grid {
    translate: [f64; 2],
    scale: [f64; 2],
}

impl Grid {
    fn fit(bounds: [f64; 4], steps: f64) -> Self {
        let [min_x, min_y, max_x, max_y] = bounds;
        let kx = if max_x > min_x { (max_x - min_x) / (steps - 1.0) } else { 1.0 };
        let ky = if max_y > min_y { (max_y - min_y) / (steps - 1.0) } else { 1.0 };
        Self {
            translate: [min_x, min_y],
            scale: [kx, ky],
        }
    }

    fn apply(&self, x: f64, y: f64) -> [f64; 2] {
        [
            ((x - self.translate[0]) / self.scale[0]).round(),
            ((y - self.translate[1]) / self.scale[1]).round(),
        ]
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Apply `f` to every position in a GeoJSON coordinates tree
fn map_positions(value: &Value, f: &dyn Fn(f64, f64) -> [f64; 2]) -> Value {
    match value {
        Value::Array(items) => {
            if let (Some(x), Some(y)) = (
                items.first().and_then(Value::as_f64),
                items.get(1).and_then(Value::as_f64),
            ) {
                let [x, y] = f(x, y);
                json!([x, y])
            } else {
                Value::Array(items.iter().map(|v| map_positions(v, f)).collect())
            }
        }
        other => other.clone(),
    }
}

fn extend_bounds(value: &Value, bounds: &mut [f64; 4]) {
    if let Value::Array(items) = value {
        if let (Some(x), Some(y)) = (
            items.first().and_then(Value::as_f64),
            items.get(1).and_then(Value::as_f64),
        ) {
            bounds[0] = bounds[0].min(x);
            bounds[1] = bounds[1].min(y);
            bounds[2] = bounds[2].max(x);
            bounds[3] = bounds[3].max(y);
        } else {
            items.iter().for_each(|v| extend_bounds(v, bounds));
        }
    }
}

impl TopologySerializer for QuantizedSerializer {
    fn serialize(&self, rows: &[ResultRow], options: &TopologyOptions) -> Result<Value, FormatError> {
        if options.precision > MAX_PRECISION {
            return Err(FormatError::InvalidPrecision(options.precision));
        }

        let mut geometries = Vec::with_capacity(rows.len());
        for row in rows {
            let geometry = row
                .geometry
                .as_ref()
                .ok_or_else(|| FormatError::MissingGeometry(row.id.clone()))?;
            if geometry["type"].as_str().is_none() || !geometry["coordinates"].is_array() {
                return Err(FormatError::InvalidGeometry {
                    id: row.id.clone(),
                    reason: "expected a GeoJSON geometry object".to_string(),
                });
            }
            geometries.push(geometry);
        }

        let grid = match options.quantization {
            Some(q) if q < 2.0 || !q.is_finite() => return Err(FormatError::InvalidQuantization(q)),
            Some(q) => {
                let mut bounds = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
                geometries
                    .iter()
                    .for_each(|g| extend_bounds(&g["coordinates"], &mut bounds));
                bounds[0].is_finite().then(|| Grid::fit(bounds, q))
            }
            None => None,
        };

        let precision = options.precision;
        let transform = |x: f64, y: f64| match &grid {
            Some(grid) => grid.apply(x, y),
            None => [round_to(x, precision), round_to(y, precision)],
        };

        let features: Vec<Value> = rows
            .iter()
            .zip(geometries)
            .map(|(row, geometry)| {
                let mut properties = Map::new();
                properties.insert("level".to_string(), Value::String(row.level.clone()));
                if let Some(name) = &row.name {
                    properties.insert("name".to_string(), Value::String(name.clone()));
                }
                if let Some(overlap) = row.overlap_size {
                    properties.insert("overlap_size".to_string(), Value::from(overlap));
                }
                json!({
                    "type": "Feature",
                    "id": row.id,
                    "properties": properties,
                    "geometry": {
                        "type": geometry["type"],
                        "coordinates": map_positions(&geometry["coordinates"], &transform),
                    }
                })
            })
            .collect();

        let mut payload = json!({
            "type": "FeatureCollection",
            "features": features,
        });
        if let Some(grid) = &grid {
            payload["transform"] = json!({
                "scale": [round_to(grid.scale[0], precision), round_to(grid.scale[1], precision)],
                "translate": [round_to(grid.translate[0], precision), round_to(grid.translate[1], precision)],
            });
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with(id: &str, geometry: Value) -> ResultRow {
        ResultRow {
            geometry: Some(geometry),
            ..ResultRow::new(id, "county")
        }
    }

    #[test]
    fn test_precision_rounding() {
        let rows = vec![row_with(
            "a",
            json!({ "type": "Point", "coordinates": [1.123456789, 2.987654321] }),
        )];
        let payload = QuantizedSerializer
            .serialize(&rows, &TopologyOptions { precision: 3, quantization: None })
            .unwrap();

        assert_eq!(payload["features"][0]["geometry"]["coordinates"], json!([1.123, 2.988]));
        assert_eq!(payload["features"][0]["id"], "a");
        assert!(payload.get("transform").is_none());
    }

    #[test]
    fn test_quantization_grid() {
        let rows = vec![
            row_with("a", json!({ "type": "Point", "coordinates": [0.0, 0.0] })),
            row_with(
                "b",
                json!({ "type": "Polygon", "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 0.0]]] }),
            ),
        ];
        let payload = QuantizedSerializer
            .serialize(&rows, &TopologyOptions { precision: 6, quantization: Some(11.0) })
            .unwrap();

        assert_eq!(payload["transform"]["scale"], json!([1.0, 1.0]));
        assert_eq!(payload["transform"]["translate"], json!([0.0, 0.0]));
        assert_eq!(
            payload["features"][1]["geometry"]["coordinates"][0][2],
            json!([10.0, 10.0])
        );
    }

    #[test]
    fn test_rows_need_geometry() {
        let rows = vec![ResultRow::new("a", "county")];
        let err = QuantizedSerializer
            .serialize(&rows, &TopologyOptions::default())
            .unwrap_err();
        assert!(matches!(err, FormatError::MissingGeometry(ref id) if id == "a"));
    }

    #[test]
    fn test_precision_is_bounded() {
        let rows = vec![row_with("a", json!({ "type": "Point", "coordinates": [1.5, 2.5] }))];
        let err = QuantizedSerializer
            .serialize(&rows, &TopologyOptions { precision: 400, quantization: None })
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidPrecision(400)));

        let payload = QuantizedSerializer
            .serialize(&rows, &TopologyOptions { precision: MAX_PRECISION, quantization: None })
            .unwrap();
        assert_eq!(payload["features"][0]["geometry"]["coordinates"], json!([1.5, 2.5]));
    }

    #[test]
    fn test_bad_quantization() {
        let rows = vec![row_with("a", json!({ "type": "Point", "coordinates": [0.0, 0.0] }))];
        let err = QuantizedSerializer
            .serialize(&rows, &TopologyOptions { precision: 6, quantization: Some(1.0) })
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidQuantization(_)));
    }
}
