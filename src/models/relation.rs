//! Relation modes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RelateError;

/// How candidate levels relate to the source geography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationMode {
    /// Candidates spatially inside the source
    Children,
    /// Candidates that spatially contain the source
    Parents,
    /// Candidates sharing any area with the source
    #[default]
    Intersects,
    /// Candidates within a radius of the source
    Distance,
    /// Same-level candidates whose boundary touches the source
    Neighbors,
}

impl RelationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationMode::Children => "children",
            RelationMode::Parents => "parents",
            RelationMode::Intersects => "intersects",
            RelationMode::Distance => "distance",
            RelationMode::Neighbors => "neighbors",
        }
    }

    /// Whether the source's own level is among the candidate levels
    pub fn keeps_source_level(&self) -> bool {
        matches!(self, RelationMode::Distance | RelationMode::Neighbors)
    }
}

impl std::fmt::Display for RelationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationMode {
    type Err = RelateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "children" => Ok(RelationMode::Children),
            "parents" => Ok(RelationMode::Parents),
            "intersects" | "" => Ok(RelationMode::Intersects),
            "distance" => Ok(RelationMode::Distance),
            "neighbors" | "neighbours" => Ok(RelationMode::Neighbors),
            other => Err(RelateError::UnknownMode {
                mode: other.to_string(),
            }),
        }
    }
}
