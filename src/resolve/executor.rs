//! Concurrent fan-out of query descriptors with a join-all barrier.

use futures::future::try_join_all;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{ResultRow, StoreRow};
use crate::query::QueryDescriptor;
use crate::store::SpatialStore;

/// Run every descriptor concurrently and concatenate their rows in
/// submission order. The first failure aborts the whole batch.
pub async fn fan_out<S: SpatialStore + ?Sized>(
    store: &S,
    descriptors: &[QueryDescriptor],
) -> Result<Vec<ResultRow>, StoreError> {
    let started = Instant::now();

    let batches = try_join_all(descriptors.iter().map(|descriptor| async move {
        debug!(
            "Dispatching {:?} query for level '{}'",
            descriptor.predicate_kind(),
            descriptor.target_level
        );
        let rows = store.execute(descriptor).await?;
        debug!("Level '{}' returned {} rows", descriptor.target_level, rows.len());
        Ok::<_, StoreError>(rows)
    }))
    .await?;

    let merged = merge(batches)?;

    info!(
        "Fan-out of {} queries returned {} rows in {:?}",
        descriptors.len(),
        merged.len(),
        started.elapsed()
    );

    Ok(merged)
}

/// Concatenate per-level batches into one normalized sequence
fn merge(batches: Vec<Vec<StoreRow>>) -> Result<Vec<ResultRow>, StoreError> {
    batches
        .into_iter()
        .flatten()
        .map(ResultRow::from_store_row)
        .collect()
}
