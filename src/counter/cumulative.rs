use super::fold;
use crate::config::TallyConfig;
use crate::error::TallyError;
use crate::model::{fresh_payload, ContributionRow};
use crate::store::RowStore;
use std::sync::Arc;

/// State-based counter: one row per writer holding its cumulative total,
/// overwritten on every increment. Nothing is ever aggregated or deleted;
/// the partition stays bounded by the number of writers.
///
/// The read-then-write is only correct under a single concurrent user per
/// writer id. Two increments racing under the same id can both read the same
/// previous total and lose one update. That weakness is part of the behavior
/// under test and is deliberately not papered over here; callers serialize
/// per writer id (the workload layer does so by ownership).
pub struct CumulativeCounter<S> {
    store: Arc<S>,
    config: TallyConfig,
}

impl<S: RowStore> CumulativeCounter<S> {
    pub fn new(store: Arc<S>, config: TallyConfig) -> Self {
        Self { store, config }
    }

    /// Read the writer's current row (absent means zero) and write back
    /// `previous + increment` under the same key. Returns the writer's new
    /// cumulative total.
    pub async fn accumulate(
        &self,
        counter_id: &str,
        writer_id: &str,
        increment: i64,
    ) -> Result<i64, TallyError> {
        let partition = self
            .store
            .read_partition(&self.config.table_name, counter_id, self.config.consistency)
            .await?;
        fold::guard_fragmentation(&self.config, counter_id, &partition)?;
        let previous = partition
            .rows
            .iter()
            .find(|row| row.token == writer_id)
            .map(|row| row.value)
            .unwrap_or(0);

        let total = previous + increment;
        let row = ContributionRow::contribution(
            counter_id,
            writer_id,
            total,
            fresh_payload(self.config.payload_size),
        );
        self.store
            .write(&self.config.table_name, row, self.config.consistency)
            .await?;
        Ok(total)
    }

    pub async fn read(&self, counter_id: &str) -> Result<i64, TallyError> {
        fold::read_total(self.store.as_ref(), &self.config, counter_id).await
    }
}
