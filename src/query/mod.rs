//! Per-level query descriptors and the compiler that produces them.

mod compiler;
pub mod sql;

pub use compiler::{CompileOptions, QueryCompiler};

use serde::Serialize;

/// Overlaps at or below this fraction of the source area are boundary touches.
pub const NEGLIGIBLE_OVERLAP: f64 = 0.01;

/// How a descriptor decides membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    Prefix,
    Spatial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialPredicate {
    /// Candidate inside source
    Contains,
    /// Source inside candidate
    Within,
    Intersects,
    /// Candidate within `$2` meters of source
    DistanceWithin,
    /// Boundaries meet, interiors do not
    Touches,
}

/// Positional statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParam {
    Text(String),
    Float(f64),
}

/// Structured form of a descriptor, for stores that do not speak SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Prefix {
        retain_length: usize,
        skip_length: usize,
    },
    Spatial {
        predicate: SpatialPredicate,
        radius_meters: Option<f64>,
        /// Minimum intersection area as a fraction of the source area
        min_overlap: Option<f64>,
        overlap_size: bool,
        /// Drop the source feature itself (self-level distance and neighbor queries)
        exclude_source: bool,
    },
}

/// Optional output columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Projection {
    pub display_name: bool,
    pub geometry: bool,
}

/// One query against one target level, consumed once by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub source_level: String,
    pub target_level: String,
    pub plan: QueryPlan,
    pub projection: Projection,
    pub statement: String,
    pub parameters: Vec<QueryParam>,
}

impl QueryDescriptor {
    pub fn predicate_kind(&self) -> PredicateKind {
        match self.plan {
            QueryPlan::Prefix { .. } => PredicateKind::Prefix,
            QueryPlan::Spatial { .. } => PredicateKind::Spatial,
        }
    }

    /// The bound source identifier (`$1`)
    pub fn source_id(&self) -> Option<&str> {
        match self.parameters.first() {
            Some(QueryParam::Text(id)) => Some(id),
            _ => None,
        }
    }
}
