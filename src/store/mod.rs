//! Spatial store seam and the in-memory implementation.
//!
//! A store takes one [`QueryDescriptor`] and returns its rows. SQL-backed
//! stores run `statement` with `parameters`; [`MemoryStore`] evaluates the
//! structured [`QueryPlan`](crate::query::QueryPlan) with an R-tree.

pub mod geometry;
mod loader;
mod memory;

pub use loader::load_memory_store;
pub use memory::{Feature, MemoryStore, MemoryStoreBuilder};

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::StoreRow;
use crate::query::QueryDescriptor;

/// Executes compiled descriptors.
pub trait SpatialStore: Send + Sync {
    fn execute<'a>(
        &'a self,
        query: &'a QueryDescriptor,
    ) -> BoxFuture<'a, Result<Vec<StoreRow>, StoreError>>;
}

impl<S: SpatialStore + ?Sized> SpatialStore for Arc<S> {
    fn execute<'a>(
        &'a self,
        query: &'a QueryDescriptor,
    ) -> BoxFuture<'a, Result<Vec<StoreRow>, StoreError>> {
        (**self).execute(query)
    }
}
