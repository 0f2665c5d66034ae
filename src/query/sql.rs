//! PostGIS statement templates, one per predicate kind.
//!
//! Identifiers and level names come from the validated registry and are
//! quoted; the source id and radius are always bound as `$1` / `$2`.

use crate::models::{LevelDescriptor, LevelGeometry};
use crate::registry::ShortcutRule;

use super::{Projection, QueryPlan, SpatialPredicate};

const SOURCE: &str = "s";
const TARGET: &str = "t";

/// SRID used for metric distance through `geography`
const GEOGRAPHY_SRID: u32 = 4326;

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn table_ref(level: &LevelDescriptor, alias: &str) -> String {
    format!(
        "{}.{} {}",
        quote_ident(&level.schema),
        quote_ident(&level.table),
        alias
    )
}

fn column(alias: &str, name: &str) -> String {
    format!("{}.{}", alias, quote_ident(name))
}

fn transform(expr: String, from: u32, to: u32) -> String {
    if from == to {
        expr
    } else {
        format!("ST_Transform({}, {})", expr, to)
    }
}

/// Geometry of `level` rows under `alias`, expressed in `query_srid`.
pub fn geometry_expr(level: &LevelDescriptor, alias: &str, query_srid: u32) -> String {
    match &level.geometry {
        LevelGeometry::Column(name) => transform(column(alias, name), level.srid, query_srid),
        LevelGeometry::LonLat {
            longitude,
            latitude,
        } => transform(
            format!(
                "ST_SetSRID(ST_MakePoint({}, {}), {})",
                column(alias, longitude),
                column(alias, latitude),
                level.srid
            ),
            level.srid,
            query_srid,
        ),
    }
}

fn select_list(
    target: &LevelDescriptor,
    projection: &Projection,
    overlap: Option<String>,
    target_geom: &str,
) -> String {
    let mut items = vec![format!("{} AS geoid", column(TARGET, &target.id_column))];
    if projection.display_name {
        items.push(format!("{} AS name", column(TARGET, &target.name_column)));
    }
    items.push(format!("{} AS level", quote_literal(&target.name)));
    if let Some(expr) = overlap {
        items.push(format!("{} AS overlap_size", expr));
    }
    if projection.geometry {
        items.push(format!("ST_AsGeoJSON({})::json AS geometry", target_geom));
    }
    items.join(", ")
}

/// Lexical-prefix membership: no geometry is evaluated.
pub fn prefix_statement(
    target: &LevelDescriptor,
    rule: &ShortcutRule,
    projection: &Projection,
) -> String {
    let target_geom = geometry_expr(target, TARGET, target.srid);
    let target_id = column(TARGET, &target.id_column);
    let from = rule.skip_length + 1;
    let width = rule.retain_length - rule.skip_length;

    format!(
        "SELECT {} FROM {} WHERE char_length($1) >= {} AND starts_with(substr({}, {}), substr($1, {}, {}))",
        select_list(target, projection, None, &target_geom),
        table_ref(target, TARGET),
        rule.retain_length,
        target_id,
        from,
        from,
        width
    )
}

/// Geometric predicate between the source row (bound by id) and every target row.
pub fn spatial_statement(
    source: &LevelDescriptor,
    target: &LevelDescriptor,
    plan: &QueryPlan,
    projection: &Projection,
    query_srid: u32,
) -> String {
    let source_geom = geometry_expr(source, SOURCE, query_srid);
    let target_geom = geometry_expr(target, TARGET, query_srid);

    let mut conditions = vec![format!("{} = $1", column(SOURCE, &source.id_column))];
    let mut overlap = None;

    if let QueryPlan::Spatial {
        predicate,
        min_overlap,
        overlap_size,
        exclude_source,
        ..
    } = plan
    {
        conditions.push(match predicate {
            SpatialPredicate::Contains => format!("ST_Contains({}, {})", source_geom, target_geom),
            SpatialPredicate::Within => format!("ST_Within({}, {})", source_geom, target_geom),
            SpatialPredicate::Intersects => {
                format!("ST_Intersects({}, {})", source_geom, target_geom)
            }
            SpatialPredicate::DistanceWithin => format!(
                "ST_DWithin({}::geography, {}::geography, $2)",
                transform(source_geom.clone(), query_srid, GEOGRAPHY_SRID),
                transform(target_geom.clone(), query_srid, GEOGRAPHY_SRID)
            ),
            SpatialPredicate::Touches => format!("ST_Touches({}, {})", source_geom, target_geom),
        });

        if let Some(fraction) = min_overlap {
            conditions.push(format!(
                "ST_Area(ST_Intersection({}, {})) > {} * ST_Area({})",
                source_geom, target_geom, fraction, source_geom
            ));
        }

        if *exclude_source {
            conditions.push(format!(
                "{} <> $1",
                column(TARGET, &target.id_column)
            ));
        }

        if *overlap_size {
            overlap = Some(if source.is_point() || target.is_point() {
                "1.0::float8".to_string()
            } else {
                format!(
                    "COALESCE(ST_Area(ST_Intersection({}, {})) / NULLIF(ST_Area({}), 0), 1.0)",
                    source_geom, target_geom, source_geom
                )
            });
        }
    }

    format!(
        "SELECT {} FROM {}, {} WHERE {}",
        select_list(target, projection, overlap, &target_geom),
        table_ref(source, SOURCE),
        table_ref(target, TARGET),
        conditions.join(" AND ")
    )
}
