//! Level descriptors for boundary ("shapes") and point ("points") datasets.

use serde::{Deserialize, Serialize};

/// Which dataset family a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFamily {
    /// Boundary polygons (states, counties, tracts, ...)
    Shapes,
    /// Point datasets with longitude/latitude columns (universities, ...)
    Points,
}

impl DatasetFamily {
    /// All families, shapes first
    pub fn all() -> &'static [DatasetFamily] {
        &[DatasetFamily::Shapes, DatasetFamily::Points]
    }
}

impl std::fmt::Display for DatasetFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetFamily::Shapes => write!(f, "shapes"),
            DatasetFamily::Points => write!(f, "points"),
        }
    }
}

/// Where a level's geometry comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelGeometry {
    /// Stored geometry column
    Column(String),
    /// Point synthesized from longitude/latitude columns
    LonLat { longitude: String, latitude: String },
}

/// Immutable description of one configured level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDescriptor {
    /// Unique level key, e.g. "county"
    pub name: String,
    pub family: DatasetFamily,
    pub schema: String,
    pub table: String,
    pub id_column: String,
    pub name_column: String,
    pub geometry: LevelGeometry,
    /// Effective SRID (the level's own, or the registry default for shapes)
    pub srid: u32,
    /// Parent level name (shapes only)
    pub parent: Option<String>,
    /// Excluded from scans unless explicitly requested
    pub ignore_by_default: bool,
}

impl LevelDescriptor {
    /// `schema.table` reference of the backing rows
    pub fn storage_ref(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    pub fn is_point(&self) -> bool {
        self.family == DatasetFamily::Points
    }
}
