//! Core data models shared by the registry, compiler and resolver.

pub mod level;
pub mod relation;
pub mod row;

pub use level::{DatasetFamily, LevelDescriptor, LevelGeometry};
pub use relation::RelationMode;
pub use row::{GroupedRows, ResultRow, StoreRow};
