//! In-process spatial store backed by per-level R-trees.

use futures::future::{BoxFuture, FutureExt};
use geo::{Geometry, Relate};
use hashbrown::HashMap;
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::geometry::{areal, distance_meters, envelope, intersection_area, to_geojson};
use super::SpatialStore;
use crate::error::StoreError;
use crate::models::row::columns;
use crate::models::{LevelDescriptor, StoreRow};
use crate::query::{QueryDescriptor, QueryPlan, SpatialPredicate};
use crate::registry::shortcut::prefix_matches;
use crate::registry::LevelRegistry;

/// Geographic SRIDs whose coordinates are plain lon/lat degrees
const LONLAT_SRIDS: &[u32] = &[4326, 4269];

const METERS_PER_DEGREE_LAT: f64 = 110_574.0;
const METERS_PER_DEGREE_LON: f64 = 111_320.0;

/// Above this latitude a radius can wrap every meridian
const POLAR_LATITUDE: f64 = 89.0;

/// One stored feature.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: String,
    pub name: Option<String>,
    /// Lon/lat geometry
    pub geometry: Geometry<f64>,
}

impl Feature {
    pub fn new(id: impl Into<String>, name: Option<String>, geometry: Geometry<f64>) -> Self {
        Self {
            id: id.into(),
            name,
            geometry,
        }
    }
}

/// Wrapper for R-tree indexing of features
#[derive(Debug, Clone)]
struct IndexedFeature {
    /// Insertion position, for stable output order
    ordinal: usize,
    feature: Arc<Feature>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[derive(Debug)]
struct LevelData {
    features: Vec<Arc<Feature>>,
    by_id: HashMap<String, Arc<Feature>>,
    tree: RTree<IndexedFeature>,
}

impl LevelData {
    fn build(features: Vec<Feature>) -> Self {
        let features: Vec<Arc<Feature>> = features.into_iter().map(Arc::new).collect();

        let indexed: Vec<IndexedFeature> = features
            .iter()
            .enumerate()
            .filter_map(|(ordinal, feature)| {
                let (min, max) = envelope(&feature.geometry)?;
                Some(IndexedFeature {
                    ordinal,
                    feature: Arc::clone(feature),
                    envelope: AABB::from_corners(min, max),
                })
            })
            .collect();

        let by_id = features
            .iter()
            .map(|f| (f.id.clone(), Arc::clone(f)))
            .collect();

        Self {
            features,
            by_id,
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Candidates whose envelope meets `query`, in insertion order
    fn candidates(&self, query: &AABB<[f64; 2]>) -> Vec<&IndexedFeature> {
        let mut found: Vec<&IndexedFeature> =
            self.tree.locate_in_envelope_intersecting(query).collect();
        found.sort_by_key(|f| f.ordinal);
        found
    }
}

/// Collects features per level before indexing
pub struct MemoryStoreBuilder {
    levels: HashMap<String, Vec<Feature>>,
}

impl MemoryStoreBuilder {
    /// Start a store for every registry level. Only lon/lat SRIDs are supported.
    pub fn new(registry: &LevelRegistry) -> Result<Self, StoreError> {
        let mut levels = HashMap::new();
        for level in registry.descriptors() {
            check_srid(level)?;
            levels.insert(level.name.clone(), Vec::new());
        }
        Ok(Self { levels })
    }

    pub fn insert(&mut self, level: &str, feature: Feature) -> Result<&mut Self, StoreError> {
        self.levels
            .get_mut(level)
            .ok_or_else(|| StoreError::Backend(format!("store has no level '{}'", level)))?
            .push(feature);
        Ok(self)
    }

    pub fn build(self) -> MemoryStore {
        let levels: HashMap<String, LevelData> = self
            .levels
            .into_iter()
            .map(|(name, features)| (name, LevelData::build(features)))
            .collect();

        let total: usize = levels.values().map(|l| l.features.len()).sum();
        info!("Memory store built with {} features", total);
        for (name, data) in &levels {
            debug!("  {}: {} features", name, data.features.len());
        }

        MemoryStore { levels }
    }
}

fn check_srid(level: &LevelDescriptor) -> Result<(), StoreError> {
    if LONLAT_SRIDS.contains(&level.srid) {
        Ok(())
    } else {
        Err(StoreError::Unsupported(format!(
            "level '{}' uses srid {}; only lon/lat srids {:?} are supported",
            level.name, level.srid, LONLAT_SRIDS
        )))
    }
}

/// Spatial store holding every level's features in memory
#[derive(Debug)]
pub struct MemoryStore {
    levels: HashMap<String, LevelData>,
}

impl MemoryStore {
    pub fn builder(registry: &LevelRegistry) -> Result<MemoryStoreBuilder, StoreError> {
        MemoryStoreBuilder::new(registry)
    }

    /// Number of features stored for a level
    pub fn len(&self, level: &str) -> usize {
        self.levels.get(level).map_or(0, |l| l.features.len())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(|l| l.features.is_empty())
    }

    fn level(&self, name: &str) -> Result<&LevelData, StoreError> {
        self.levels
            .get(name)
            .ok_or_else(|| StoreError::Backend(format!("store has no level '{}'", name)))
    }

    fn run(&self, query: &QueryDescriptor) -> Result<Vec<StoreRow>, StoreError> {
        let source_id = query
            .source_id()
            .ok_or_else(|| StoreError::Backend("query has no source id bound".to_string()))?;
        let target = self.level(&query.target_level)?;

        match &query.plan {
            QueryPlan::Prefix {
                retain_length,
                skip_length,
            } => Ok(target
                .features
                .iter()
                .filter(|f| prefix_matches(source_id, &f.id, *skip_length, *retain_length))
                .map(|f| self.row(query, f, None))
                .collect()),
            QueryPlan::Spatial {
                predicate,
                radius_meters,
                min_overlap,
                overlap_size,
                exclude_source,
            } => {
                let source_level = self.level(&query.source_level)?;
                let Some(source) = source_level.by_id.get(source_id) else {
                    return Ok(Vec::new());
                };
                let Some((min, max)) = envelope(&source.geometry) else {
                    return Ok(Vec::new());
                };

                let search = match (predicate, radius_meters) {
                    (SpatialPredicate::DistanceWithin, Some(meters)) => expand(min, max, *meters),
                    _ => AABB::from_corners(min, max),
                };

                // Intersection areas are only computed when a ratio or the filter reads them
                let needs_area = *overlap_size || min_overlap.is_some();
                let source_area = needs_area.then(|| areal(&source.geometry)).flatten();

                let mut rows = Vec::new();
                for candidate in target.candidates(&search) {
                    let feature = &candidate.feature;
                    if *exclude_source && feature.id == source.id {
                        continue;
                    }

                    let matched = match predicate {
                        SpatialPredicate::Contains => {
                            source.geometry.relate(&feature.geometry).is_contains()
                        }
                        SpatialPredicate::Within => {
                            source.geometry.relate(&feature.geometry).is_within()
                        }
                        SpatialPredicate::Intersects => {
                            source.geometry.relate(&feature.geometry).is_intersects()
                        }
                        SpatialPredicate::DistanceWithin => {
                            let meters = radius_meters.ok_or_else(|| {
                                StoreError::Backend("distance query without radius".to_string())
                            })?;
                            distance_meters(&source.geometry, &feature.geometry) <= meters
                        }
                        SpatialPredicate::Touches => {
                            source.geometry.relate(&feature.geometry).is_touches()
                        }
                    };
                    if !matched {
                        continue;
                    }

                    let target_area = needs_area.then(|| areal(&feature.geometry)).flatten();
                    let overlap = match (&source_area, target_area) {
                        (Some(src), Some(tgt)) => {
                            let src_area = geo::Area::unsigned_area(src);
                            let shared = intersection_area(src, &tgt);
                            Some((shared, src_area))
                        }
                        _ => None,
                    };

                    if let (Some(fraction), Some((shared, src_area))) = (min_overlap, overlap) {
                        if shared <= fraction * src_area {
                            continue;
                        }
                    }

                    let overlap_value = overlap_size.then(|| match overlap {
                        Some((shared, src_area)) if src_area > 0.0 => shared / src_area,
                        _ => 1.0,
                    });

                    rows.push(self.row(query, feature, overlap_value));
                }
                Ok(rows)
            }
        }
    }

    fn row(&self, query: &QueryDescriptor, feature: &Feature, overlap: Option<f64>) -> StoreRow {
        let mut row = StoreRow::new();
        row.insert(columns::ID.to_string(), Value::String(feature.id.clone()));
        if query.projection.display_name {
            row.insert(
                columns::NAME.to_string(),
                feature.name.clone().map_or(Value::Null, Value::String),
            );
        }
        row.insert(
            columns::LEVEL.to_string(),
            Value::String(query.target_level.clone()),
        );
        if let Some(overlap) = overlap {
            row.insert(columns::OVERLAP_SIZE.to_string(), Value::from(overlap));
        }
        if query.projection.geometry {
            row.insert(columns::GEOMETRY.to_string(), to_geojson(&feature.geometry));
        }
        row
    }
}

/// Grow a lon/lat envelope by `meters` in every direction. Envelopes that
/// reach a pole or cross the antimeridian span every longitude.
fn expand(min: [f64; 2], max: [f64; 2], meters: f64) -> AABB<[f64; 2]> {
    let dlat = meters / METERS_PER_DEGREE_LAT;
    let south = (min[1] - dlat).max(-90.0);
    let north = (max[1] + dlat).min(90.0);

    // Degrees of longitude shrink fastest at the latitude furthest from the equator
    let far_lat = south.abs().max(north.abs());
    let (west, east) = if far_lat >= POLAR_LATITUDE {
        (-180.0, 180.0)
    } else {
        let dlon = meters / (METERS_PER_DEGREE_LON * far_lat.to_radians().cos());
        let (west, east) = (min[0] - dlon, max[0] + dlon);
        if west < -180.0 || east > 180.0 {
            (-180.0, 180.0)
        } else {
            (west, east)
        }
    };

    AABB::from_corners([west, south], [east, north])
}

impl SpatialStore for MemoryStore {
    fn execute<'a>(
        &'a self,
        query: &'a QueryDescriptor,
    ) -> BoxFuture<'a, Result<Vec<StoreRow>, StoreError>> {
        async move { self.run(query) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelationMode;
    use crate::query::{CompileOptions, QueryCompiler};
    use crate::registry::tests::fixture_registry;
    use geo::{polygon, Point};

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)
        ])
    }

    fn store() -> MemoryStore {
        let registry = fixture_registry();
        let mut builder = MemoryStore::builder(&registry).unwrap();
        builder
            .insert("state", Feature::new("04000US36", Some("New York".into()), square(0.0, 0.0, 1.0, 1.0)))
            .unwrap()
            .insert("county", Feature::new("05000US36001", Some("Albany".into()), square(0.0, 0.0, 0.5, 1.0)))
            .unwrap()
            .insert("county", Feature::new("05000US36003", Some("Allegany".into()), square(0.5, 0.0, 1.0, 1.0)))
            .unwrap()
            .insert("university", Feature::new("190150", None, Geometry::Point(Point::new(0.25, 0.5))))
            .unwrap();
        builder.build()
    }

    #[tokio::test]
    async fn test_contains_and_overlap() {
        let registry = fixture_registry();
        let store = store();
        let options = CompileOptions { overlap_size: true, display_name: true, ..Default::default() };
        let descriptors = QueryCompiler::new(&registry)
            .compile("04000US36", RelationMode::Intersects, &["county", "university"], &options)
            .unwrap();

        let counties = store.execute(&descriptors[0]).await.unwrap();
        assert_eq!(counties.len(), 2);
        assert_eq!(counties[0]["name"], "Albany");
        let overlap = counties[0]["overlap_size"].as_f64().unwrap();
        assert!((overlap - 0.5).abs() < 1e-9);

        let universities = store.execute(&descriptors[1]).await.unwrap();
        assert_eq!(universities.len(), 1);
        assert_eq!(universities[0]["overlap_size"], 1.0);
        assert_eq!(universities[0]["name"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_source_yields_no_rows() {
        let registry = fixture_registry();
        let store = store();
        let descriptors = QueryCompiler::new(&registry)
            .compile("05000US99999", RelationMode::Parents, &["state"], &CompileOptions::default())
            .unwrap();
        assert!(store.execute(&descriptors[0]).await.unwrap().is_empty());
    }

    #[test]
    fn test_builder_rejects_unknown_level() {
        let registry = fixture_registry();
        let mut builder = MemoryStore::builder(&registry).unwrap();
        let err = builder
            .insert("galaxy", Feature::new("x", None, Geometry::Point(Point::new(0.0, 0.0))))
            .err();
        assert!(err.is_some());
    }

    #[test]
    fn test_expand_envelope() {
        let aabb = expand([0.0, 0.0], [1.0, 1.0], 110_574.0);
        assert!((aabb.lower()[1] + 1.0).abs() < 1e-9);
        assert!((aabb.upper()[1] - 2.0).abs() < 1e-9);
        assert!(aabb.upper()[0] > 1.99);
    }

    #[test]
    fn test_expand_near_pole_spans_all_longitudes() {
        let aabb = expand([10.0, 89.5], [11.0, 89.6], 5_000.0);
        assert_eq!(aabb.lower()[0], -180.0);
        assert_eq!(aabb.upper()[0], 180.0);
        assert!(aabb.upper()[1] <= 90.0);

        // Reaching past the pole clamps latitude
        let aabb = expand([0.0, 88.0], [1.0, 88.5], 200_000.0);
        assert_eq!(aabb.upper()[1], 90.0);
        assert_eq!(aabb.lower()[0], -180.0);
    }

    #[test]
    fn test_expand_across_antimeridian() {
        let aabb = expand([179.9, 0.0], [179.95, 0.1], 50_000.0);
        assert_eq!(aabb.lower()[0], -180.0);
        assert_eq!(aabb.upper()[0], 180.0);
    }

    #[tokio::test]
    async fn test_membership_without_ratio() {
        let registry = fixture_registry();
        let store = store();
        let descriptors = QueryCompiler::new(&registry)
            .compile("04000US36", RelationMode::Children, &["university"], &CompileOptions::default())
            .unwrap();

        let rows = store.execute(&descriptors[0]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].contains_key("overlap_size"));
    }

    #[tokio::test]
    async fn test_touching_neighbors() {
        let registry = fixture_registry();
        let store = store();
        let descriptors = QueryCompiler::new(&registry)
            .compile("05000US36001", RelationMode::Neighbors, &["county"], &CompileOptions::default())
            .unwrap();

        let rows = store.execute(&descriptors[0]).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["geoid"].as_str()).collect();
        assert_eq!(ids, vec!["05000US36003"]);
    }
}
