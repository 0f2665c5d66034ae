//! Turns (source id, relation mode, target levels) into query descriptors.

use tracing::debug;

use super::{
    sql, Projection, QueryDescriptor, QueryParam, QueryPlan, SpatialPredicate, NEGLIGIBLE_OVERLAP,
};
use crate::error::RelateError;
use crate::models::{LevelDescriptor, RelationMode};
use crate::registry::LevelRegistry;

/// Per-request compile switches
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Project the overlap ratio on spatial descriptors
    pub overlap_size: bool,
    /// Radius for distance mode, in kilometers
    pub range_km: Option<f64>,
    pub display_name: bool,
    /// Project GeoJSON geometry (topology output)
    pub geometry: bool,
    /// Drop intersects matches covering at most 1% of the source
    pub filter_negligible: bool,
    /// Allow lexical-prefix shortcuts
    pub use_shortcuts: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            overlap_size: false,
            range_km: None,
            display_name: false,
            geometry: false,
            filter_negligible: true,
            use_shortcuts: true,
        }
    }
}

/// Validate the radius for `mode`, returning it in meters.
pub(crate) fn radius_meters(
    mode: RelationMode,
    range_km: Option<f64>,
) -> Result<Option<f64>, RelateError> {
    if mode != RelationMode::Distance {
        return Ok(None);
    }
    match range_km {
        None => Err(RelateError::InvalidRange {
            reason: "distance mode requires a range in kilometers".to_string(),
        }),
        Some(km) if !km.is_finite() || km <= 0.0 => Err(RelateError::InvalidRange {
            reason: format!("range must be a positive number of kilometers, got {}", km),
        }),
        Some(km) => Ok(Some(km * 1000.0)),
    }
}

/// Compiles descriptors against a registry
pub struct QueryCompiler<'a> {
    registry: &'a LevelRegistry,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a LevelRegistry) -> Self {
        Self { registry }
    }

    /// One descriptor per target level, in `targets` order. The source level
    /// is skipped except in distance and neighbors modes.
    pub fn compile(
        &self,
        source_id: &str,
        mode: RelationMode,
        targets: &[&str],
        options: &CompileOptions,
    ) -> Result<Vec<QueryDescriptor>, RelateError> {
        let radius = radius_meters(mode, options.range_km)?;
        let source = self.registry.classify(source_id)?;

        let mut descriptors = Vec::with_capacity(targets.len());
        for target_name in targets {
            let target = self.registry.lookup(target_name)?;
            if target.name == source.name && !mode.keeps_source_level() {
                continue;
            }
            descriptors.push(self.compile_one(source_id, source, target, mode, radius, options));
        }

        debug!(
            "Compiled {} descriptors for {} ({}) in {} mode",
            descriptors.len(),
            source_id,
            source.name,
            mode
        );

        Ok(descriptors)
    }

    fn compile_one(
        &self,
        source_id: &str,
        source: &LevelDescriptor,
        target: &LevelDescriptor,
        mode: RelationMode,
        radius: Option<f64>,
        options: &CompileOptions,
    ) -> QueryDescriptor {
        let projection = Projection {
            display_name: options.display_name,
            geometry: options.geometry,
        };

        let shortcut = options
            .use_shortcuts
            .then(|| {
                self.registry
                    .shortcuts()
                    .rule_for(&source.name, &target.name, mode)
            })
            .flatten();

        if let Some(rule) = shortcut {
            return QueryDescriptor {
                source_level: source.name.clone(),
                target_level: target.name.clone(),
                plan: QueryPlan::Prefix {
                    retain_length: rule.retain_length,
                    skip_length: rule.skip_length,
                },
                projection,
                statement: sql::prefix_statement(target, rule, &projection),
                parameters: vec![QueryParam::Text(source_id.to_string())],
            };
        }

        let predicate = match mode {
            RelationMode::Children => SpatialPredicate::Contains,
            RelationMode::Parents => SpatialPredicate::Within,
            RelationMode::Intersects => SpatialPredicate::Intersects,
            RelationMode::Distance => SpatialPredicate::DistanceWithin,
            RelationMode::Neighbors => SpatialPredicate::Touches,
        };

        let min_overlap = (predicate == SpatialPredicate::Intersects
            && options.filter_negligible
            && !source.is_point()
            && !target.is_point())
        .then_some(NEGLIGIBLE_OVERLAP);

        let plan = QueryPlan::Spatial {
            predicate,
            radius_meters: radius,
            min_overlap,
            overlap_size: options.overlap_size,
            exclude_source: mode.keeps_source_level() && source.name == target.name,
        };

        let mut parameters = vec![QueryParam::Text(source_id.to_string())];
        if let Some(meters) = radius {
            parameters.push(QueryParam::Float(meters));
        }

        QueryDescriptor {
            source_level: source.name.clone(),
            target_level: target.name.clone(),
            statement: sql::spatial_statement(source, target, &plan, &projection, source.srid),
            plan,
            projection,
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PredicateKind;
    use crate::registry::tests::fixture_registry;

    fn targets_without<'r>(registry: &'r LevelRegistry, skip: &[&str]) -> Vec<&'r str> {
        registry
            .descriptors()
            .map(|d| d.name.as_str())
            .filter(|name| !skip.contains(name))
            .collect()
    }

    #[test]
    fn test_county_children_skipping_tract() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);
        let targets = targets_without(&registry, &["tract"]);

        let descriptors = compiler
            .compile("05000US36001", RelationMode::Children, &targets, &CompileOptions::default())
            .unwrap();

        let levels: Vec<&str> = descriptors.iter().map(|d| d.target_level.as_str()).collect();
        assert_eq!(levels, vec!["state", "place", "university"]);
        for d in &descriptors {
            assert_eq!(d.source_level, "county");
            assert_eq!(d.predicate_kind(), PredicateKind::Spatial);
            assert!(d.statement.contains("ST_Contains("));
        }
    }

    #[test]
    fn test_county_children_shortcut_for_tract() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);

        let descriptors = compiler
            .compile(
                "05000US36001",
                RelationMode::Children,
                &["tract", "place"],
                &CompileOptions { overlap_size: true, ..Default::default() },
            )
            .unwrap();

        assert_eq!(descriptors[0].target_level, "tract");
        assert_eq!(descriptors[0].predicate_kind(), PredicateKind::Prefix);
        assert!(descriptors[0].statement.contains("starts_with(substr(t.\"geoid\", 8), substr($1, 8, 5))"));
        assert!(!descriptors[0].statement.contains("overlap_size"));
        assert!(!descriptors[0].statement.contains("ST_"));

        assert_eq!(descriptors[1].predicate_kind(), PredicateKind::Spatial);
        assert!(descriptors[1].statement.contains("AS overlap_size"));
    }

    #[test]
    fn test_shortcuts_can_be_disabled() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);
        let options = CompileOptions { use_shortcuts: false, ..Default::default() };

        let descriptors = compiler
            .compile("05000US36001", RelationMode::Children, &["tract"], &options)
            .unwrap();
        assert_eq!(descriptors[0].predicate_kind(), PredicateKind::Spatial);
    }

    #[test]
    fn test_shortcut_only_for_matching_mode() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);

        let descriptors = compiler
            .compile("04000US36", RelationMode::Intersects, &["county"], &CompileOptions::default())
            .unwrap();
        assert_eq!(descriptors[0].predicate_kind(), PredicateKind::Spatial);
        assert!(descriptors[0].statement.contains("ST_Intersects("));
        assert!(descriptors[0].statement.contains("> 0.01 * ST_Area("));
    }

    #[test]
    fn test_source_id_is_bound_not_interpolated() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);
        let hostile = "05000US36001'; DROP TABLE counties; --";

        let descriptors = compiler
            .compile(hostile, RelationMode::Parents, &["state"], &CompileOptions::default())
            .unwrap();

        let d = &descriptors[0];
        assert!(!d.statement.contains("DROP TABLE"));
        assert_eq!(d.parameters, vec![QueryParam::Text(hostile.to_string())]);
        assert_eq!(d.source_id(), Some(hostile));
        assert!(d.statement.contains("ST_Within("));
    }

    #[test]
    fn test_distance_requires_range() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);

        for range in [None, Some(f64::NAN), Some(-5.0), Some(0.0)] {
            let options = CompileOptions { range_km: range, ..Default::default() };
            let err = compiler
                .compile("05000US36001", RelationMode::Distance, &["county"], &options)
                .unwrap_err();
            assert!(matches!(err, RelateError::InvalidRange { .. }));
        }
    }

    #[test]
    fn test_distance_binds_meters_and_keeps_self_level() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);
        let options = CompileOptions { range_km: Some(25.0), ..Default::default() };

        let descriptors = compiler
            .compile("05000US36001", RelationMode::Distance, &["county"], &options)
            .unwrap();

        let d = &descriptors[0];
        assert_eq!(d.target_level, "county");
        assert_eq!(d.parameters[1], QueryParam::Float(25_000.0));
        assert!(d.statement.contains("ST_DWithin("));
        assert!(d.statement.contains("t.\"geoid\" <> $1"));
        assert!(matches!(d.plan, QueryPlan::Spatial { exclude_source: true, .. }));
    }

    #[test]
    fn test_neighbors_touch_same_level() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);

        let descriptors = compiler
            .compile("05000US36001", RelationMode::Neighbors, &["county"], &CompileOptions::default())
            .unwrap();

        let d = &descriptors[0];
        assert_eq!(d.target_level, "county");
        assert_eq!(d.predicate_kind(), PredicateKind::Spatial);
        assert!(d.statement.contains("ST_Touches("));
        assert!(!d.statement.contains("ST_Area"));
        assert_eq!(d.parameters.len(), 1);
        assert!(matches!(
            d.plan,
            QueryPlan::Spatial { predicate: SpatialPredicate::Touches, exclude_source: true, .. }
        ));
    }

    #[test]
    fn test_point_target_builds_geometry() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);
        let options = CompileOptions { overlap_size: true, ..Default::default() };

        let descriptors = compiler
            .compile("05000US36001", RelationMode::Intersects, &["university"], &options)
            .unwrap();

        let d = &descriptors[0];
        assert!(d
            .statement
            .contains("ST_Transform(ST_SetSRID(ST_MakePoint(t.\"lng\", t.\"lat\"), 4326), 4269)"));
        assert!(d.statement.contains("1.0::float8 AS overlap_size"));
        assert!(matches!(d.plan, QueryPlan::Spatial { min_overlap: None, .. }));
    }

    #[test]
    fn test_unknown_source_and_target() {
        let registry = fixture_registry();
        let compiler = QueryCompiler::new(&registry);

        let err = compiler
            .compile("99900US1", RelationMode::Children, &["tract"], &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, RelateError::UnknownLevel { .. }));

        let err = compiler
            .compile("05000US36001", RelationMode::Children, &["galaxy"], &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, RelateError::UnknownLevel { .. }));
    }
}
