//! Final shaping of merged rows: synthetic root row, grouping, topology.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{GroupedRows, RelationMode, ResultRow};
use crate::registry::RootConfig;

/// When to prepend the synthetic root-level row ("nation").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootRow {
    /// Only for parents, intersects and distance without a target subset
    #[default]
    Auto,
    Always,
    Never,
}

impl RootRow {
    pub fn includes(&self, mode: RelationMode, explicit_targets: bool) -> bool {
        match self {
            RootRow::Auto => {
                !matches!(mode, RelationMode::Children | RelationMode::Neighbors) && !explicit_targets
            }
            RootRow::Always => true,
            RootRow::Never => false,
        }
    }
}

impl std::str::FromStr for RootRow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(RootRow::Auto),
            "always" => Ok(RootRow::Always),
            "never" => Ok(RootRow::Never),
            other => Err(format!("expected auto, always or never, got '{}'", other)),
        }
    }
}

/// Build the synthetic root row for `root`.
pub fn root_row(root: &RootConfig, overlap_size: bool, display_name: bool) -> ResultRow {
    ResultRow {
        name: display_name.then(|| root.name.clone()),
        overlap_size: overlap_size.then_some(1.0),
        ..ResultRow::new(root.id.clone(), root.level.clone())
    }
}

/// Output of a resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resolution {
    Rows(Vec<ResultRow>),
    Grouped(GroupedRows),
    Topology(Value),
}

impl Resolution {
    /// Rows, when the output is a flat sequence
    pub fn rows(&self) -> Option<&[ResultRow]> {
        match self {
            Resolution::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn grouped(&self) -> Option<&GroupedRows> {
        match self {
            Resolution::Grouped(groups) => Some(groups),
            _ => None,
        }
    }

    pub fn topology(&self) -> Option<&Value> {
        match self {
            Resolution::Topology(payload) => Some(payload),
            _ => None,
        }
    }
}
