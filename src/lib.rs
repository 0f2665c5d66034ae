//! Georelate - resolves spatial relationships between a geography and every
//! other configured geographic level.
//!
//! This library provides the level registry, query compiler, spatial store
//! seam and resolver used by the `georelate` binary.

pub mod error;
pub mod models;
pub mod query;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod topology;

pub use error::{ConfigError, FormatError, RelateError, StoreError};
pub use models::{DatasetFamily, GroupedRows, LevelDescriptor, RelationMode, ResultRow};
pub use registry::{Config, LevelRegistry};
pub use resolve::{parse_range_km, Resolution, ResolveOptions, Resolver, RootRow};
pub use store::{MemoryStore, SpatialStore};
pub use topology::{QuantizedSerializer, TopologyOptions, TopologySerializer};
