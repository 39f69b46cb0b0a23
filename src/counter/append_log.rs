use super::fold;
use crate::config::TallyConfig;
use crate::error::TallyError;
use crate::model::{fresh_payload, op_token, ContributionRow};
use crate::store::RowStore;
use std::sync::Arc;

/// Operation-based counter: one uniquely keyed row per increment.
///
/// Ordinary writers blind-insert under `"{writer_id}-{seq}"` tokens, which
/// are disjoint across writers by construction, so any number of workers can
/// append concurrently without a read-modify-write race. The elected
/// aggregator's increments instead run a fold round (see [`fold`]).
pub struct AppendLogCounter<S> {
    store: Arc<S>,
    config: TallyConfig,
}

impl<S: RowStore> AppendLogCounter<S> {
    pub fn new(store: Arc<S>, config: TallyConfig) -> Self {
        Self { store, config }
    }

    /// Writer path: a single-row insert, no preceding read. The sequence
    /// number must be strictly increasing per writer; a reused token would
    /// silently overwrite an earlier contribution and corrupt the total.
    pub async fn append(
        &self,
        counter_id: &str,
        writer_id: &str,
        seq: u64,
        value: i64,
    ) -> Result<(), TallyError> {
        let row = ContributionRow::contribution(
            counter_id,
            op_token(writer_id, seq),
            value,
            fresh_payload(self.config.payload_size),
        );
        self.store
            .write(&self.config.table_name, row, self.config.consistency)
            .await?;
        Ok(())
    }

    /// Aggregator path: fold all live rows plus this increment into the
    /// summary row. Returns the new total.
    pub async fn fold(&self, counter_id: &str, increment: i64) -> Result<i64, TallyError> {
        fold::fold_increment(self.store.as_ref(), &self.config, counter_id, increment).await
    }

    pub async fn read(&self, counter_id: &str) -> Result<i64, TallyError> {
        fold::read_total(self.store.as_ref(), &self.config, counter_id).await
    }
}
