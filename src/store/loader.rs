//! Load level datasets from a data directory into a [`MemoryStore`].
//!
//! Shapes come from `<dir>/<schema>/<table>.geojson`, points from
//! `<dir>/<schema>/<table>.csv`.

use csv::ReaderBuilder;
use geo::{Geometry, Point};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::geometry::from_geojson;
use super::memory::{Feature, MemoryStore};
use crate::error::StoreError;
use crate::models::{LevelDescriptor, LevelGeometry};
use crate::registry::LevelRegistry;

pub fn load_memory_store(registry: &LevelRegistry, data_dir: &Path) -> Result<MemoryStore, StoreError> {
    info!("Loading level datasets from {}", data_dir.display());

    let mut builder = MemoryStore::builder(registry)?;

    for level in registry.descriptors() {
        let path = dataset_path(data_dir, level);
        if !path.exists() {
            warn!(
                "No dataset for level '{}' at {}; level will be empty",
                level.name,
                path.display()
            );
            continue;
        }

        let features = match &level.geometry {
            LevelGeometry::Column(_) => load_shapes(&path, level)?,
            LevelGeometry::LonLat {
                longitude,
                latitude,
            } => load_points(&path, level, longitude, latitude)?,
        };

        info!("Loaded {} features for level '{}'", features.len(), level.name);
        for feature in features {
            builder.insert(&level.name, feature)?;
        }
    }

    Ok(builder.build())
}

fn dataset_path(data_dir: &Path, level: &LevelDescriptor) -> PathBuf {
    let extension = match level.geometry {
        LevelGeometry::Column(_) => "geojson",
        LevelGeometry::LonLat { .. } => "csv",
    };
    data_dir
        .join(&level.schema)
        .join(format!("{}.{}", level.table, extension))
}

fn dataset_error(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Dataset {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn property_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn load_shapes(path: &Path, level: &LevelDescriptor) -> Result<Vec<Feature>, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collection: Value = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| dataset_error(path, e.to_string()))?;

    let features = collection["features"]
        .as_array()
        .ok_or_else(|| dataset_error(path, "expected a FeatureCollection"))?;

    features
        .iter()
        .enumerate()
        .map(|(idx, feature)| {
            let properties = &feature["properties"];
            let id = property_text(&properties[&level.id_column]).ok_or_else(|| {
                dataset_error(
                    path,
                    format!("feature {} has no '{}' property", idx, level.id_column),
                )
            })?;
            let name = property_text(&properties[&level.name_column]);
            let geometry = from_geojson(&feature["geometry"])
                .map_err(|e| dataset_error(path, format!("feature '{}': {}", id, e)))?;
            Ok(Feature::new(id, name, geometry))
        })
        .collect()
}

fn load_points(
    path: &Path,
    level: &LevelDescriptor,
    longitude: &str,
    latitude: &str,
) -> Result<Vec<Feature>, StoreError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| dataset_error(path, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| dataset_error(path, e.to_string()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| dataset_error(path, format!("column '{}' not found", name)))
    };

    let id_idx = column(&level.id_column)?;
    let lon_idx = column(longitude)?;
    let lat_idx = column(latitude)?;
    let name_idx = headers.iter().position(|h| h == level.name_column);

    let mut features = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| dataset_error(path, e.to_string()))?;

        let id = record.get(id_idx).unwrap_or_default().to_string();
        let coord = |idx: usize| {
            record
                .get(idx)
                .and_then(|v| v.trim().parse::<f64>().ok())
        };
        let (Some(lon), Some(lat)) = (coord(lon_idx), coord(lat_idx)) else {
            warn!("Skipping '{}' in {}: no usable coordinates", id, path.display());
            continue;
        };

        let name = name_idx
            .and_then(|idx| record.get(idx))
            .filter(|n| !n.is_empty())
            .map(String::from);

        features.push(Feature::new(id, name, Geometry::Point(Point::new(lon, lat))));
    }

    Ok(features)
}
