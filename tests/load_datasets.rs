mod common;

use std::fs;
use std::path::Path;

use georelate::store::load_memory_store;
use georelate::{RelationMode, ResolveOptions, Resolver, StoreError};
use serde_json::json;
use tempfile::TempDir;

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
    })
}

fn write(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_datasets(dir: &Path) {
    let states = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "geoid": "04000US36", "name": "New York" },
              "geometry": square(0.0, 0.0, 2.0, 2.0) }
        ]
    });
    let counties = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "geoid": "05000US36001", "namelsad": "Albany County" },
              "geometry": square(0.0, 0.0, 1.0, 2.0) },
            { "type": "Feature", "properties": { "geoid": "05000US36003", "namelsad": "Allegany County" },
              "geometry": square(1.0, 0.0, 2.0, 2.0) }
        ]
    });

    write(dir, "shapes/states.geojson", &states.to_string());
    write(dir, "shapes/counties.geojson", &counties.to_string());
    write(
        dir,
        "ipeds/universities.csv",
        "university,university_name,lng,lat\n\
         190150,State University,0.5,1.5\n\
         190151,Nowhere College,,\n\
         190152,Hill College,1.5,0.5\n",
    );
}

#[tokio::test]
async fn loads_and_resolves_from_disk() {
    let dir = TempDir::new().unwrap();
    write_datasets(dir.path());

    let registry = common::registry();
    let store = load_memory_store(&registry, dir.path()).unwrap();

    assert_eq!(store.len("state"), 1);
    assert_eq!(store.len("county"), 2);
    // Missing files leave the level empty
    assert_eq!(store.len("place"), 0);
    assert_eq!(store.len("tract"), 0);
    // Rows without coordinates are skipped
    assert_eq!(store.len("university"), 2);

    let resolver = Resolver::new(registry, store);
    let options = ResolveOptions {
        target_levels: Some(vec!["university".to_string()]),
        display_name: true,
        ..Default::default()
    };
    let resolution = resolver
        .resolve_relations("05000US36001", RelationMode::Children, &options)
        .await
        .unwrap();
    let rows = resolution.rows().unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "190150");
    assert_eq!(rows[0].name.as_deref(), Some("State University"));
}

#[test]
fn numeric_ids_are_read_as_text() {
    let dir = TempDir::new().unwrap();
    let states = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "geoid": 36, "name": "New York" },
              "geometry": square(0.0, 0.0, 2.0, 2.0) }
        ]
    });
    write(dir.path(), "shapes/states.geojson", &states.to_string());

    let store = load_memory_store(&common::registry(), dir.path()).unwrap();
    assert_eq!(store.len("state"), 1);
}

#[test]
fn malformed_dataset_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "shapes/states.geojson", r#"{ "type": "Topology" }"#);

    let err = load_memory_store(&common::registry(), dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::Dataset { .. }));
}

#[test]
fn missing_id_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ipeds/universities.csv", "unitid,lng,lat\n1,0.5,0.5\n");

    let err = load_memory_store(&common::registry(), dir.path()).unwrap_err();
    assert!(err.to_string().contains("column 'university' not found"));
}
