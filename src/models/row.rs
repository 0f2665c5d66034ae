//! Result rows and their grouping.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::StoreError;

/// Raw row returned by a spatial store: column name to value.
pub type StoreRow = serde_json::Map<String, Value>;

/// Column names every store must use in its projections.
pub mod columns {
    pub const ID: &str = "geoid";
    pub const NAME: &str = "name";
    pub const LEVEL: &str = "level";
    pub const OVERLAP_SIZE: &str = "overlap_size";
    pub const GEOMETRY: &str = "geometry";
}

/// One related geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "geoid")]
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub level: String,

    /// Fraction of the source area covered by the intersection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_size: Option<f64>,

    /// GeoJSON geometry, only fetched for topology output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

impl ResultRow {
    pub fn new(id: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            level: level.into(),
            overlap_size: None,
            geometry: None,
        }
    }

    /// Normalize a store row. Ids may come back as numbers from some tables.
    pub fn from_store_row(mut row: StoreRow) -> Result<Self, StoreError> {
        let id = match row.remove(columns::ID) {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            other => {
                return Err(StoreError::Backend(format!(
                    "row is missing a textual '{}' column (got {:?})",
                    columns::ID,
                    other
                )))
            }
        };

        let level = match row.remove(columns::LEVEL) {
            Some(Value::String(s)) => s,
            _ => {
                return Err(StoreError::Backend(format!(
                    "row '{}' is missing its '{}' column",
                    id,
                    columns::LEVEL
                )))
            }
        };

        let name = match row.remove(columns::NAME) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        let overlap_size = row.remove(columns::OVERLAP_SIZE).and_then(|v| v.as_f64());

        let geometry = match row.remove(columns::GEOMETRY) {
            Some(Value::Null) | None => None,
            // Some drivers hand back ST_AsGeoJSON output as text
            Some(Value::String(s)) => Some(serde_json::from_str(&s).map_err(|e| {
                StoreError::Backend(format!("invalid geometry for '{}': {}", id, e))
            })?),
            Some(v) => Some(v),
        };

        Ok(Self {
            id,
            name,
            level,
            overlap_size,
            geometry,
        })
    }
}

/// Rows partitioned by level, in first-seen level order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedRows {
    groups: Vec<(String, Vec<ResultRow>)>,
}

impl GroupedRows {
    /// Partition rows by `level`, preserving row order inside each group.
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        let mut groups: Vec<(String, Vec<ResultRow>)> = Vec::new();
        for row in rows {
            match groups.iter_mut().find(|(level, _)| *level == row.level) {
                Some((_, bucket)) => bucket.push(row),
                None => groups.push((row.level.clone(), vec![row])),
            }
        }
        Self { groups }
    }

    pub fn get(&self, level: &str) -> Option<&[ResultRow]> {
        self.groups
            .iter()
            .find(|(l, _)| l == level)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Serialize for GroupedRows {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (level, rows) in &self.groups {
            map.serialize_entry(level, rows)?;
        }
        map.end()
    }
}
