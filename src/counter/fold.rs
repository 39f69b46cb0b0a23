//! GC/aggregation engine and the read path.
//!
//! Aggregation keeps the partition bounded: every live contribution row is
//! folded into the single summary row inside one atomic single-partition
//! batch. Correctness rests entirely on the store's batch guarantee; there
//! is no lock, no consensus and no retry here. Rows that land between the
//! read and the batch are untouched and simply join a later round.

use crate::config::{DeleteMode, TallyConfig};
use crate::error::TallyError;
use crate::model::{fresh_payload, ContributionRow};
use crate::store::{Partition, RowMutation, RowStore};
use tracing::{debug, warn};

/// Fold every live contribution row plus the aggregator's own `increment`
/// into the summary row. Returns the new total.
pub async fn fold_increment<S: RowStore>(
    store: &S,
    config: &TallyConfig,
    counter_id: &str,
    increment: i64,
) -> Result<i64, TallyError> {
    let partition = store
        .read_partition(&config.table_name, counter_id, config.consistency)
        .await?;
    guard_fragmentation(config, counter_id, &partition)?;

    let mut new_total = increment;
    let mut mutations = Vec::with_capacity(partition.rows.len() + 1);
    for row in &partition.rows {
        if row.deleted {
            continue;
        }
        new_total += row.value;
        if row.is_summary() {
            continue;
        }
        mutations.push(match config.delete_mode {
            DeleteMode::Hard => RowMutation::Delete {
                token: row.token.clone(),
            },
            DeleteMode::Soft => RowMutation::MarkDeleted {
                token: row.token.clone(),
            },
        });
    }
    let folded = mutations.len();
    mutations.push(RowMutation::Upsert(ContributionRow::summary(
        counter_id,
        new_total,
        fresh_payload(config.payload_size),
    )));

    store
        .atomic_batch(&config.table_name, counter_id, mutations, config.consistency)
        .await?;

    debug!(counter_id, new_total, folded, "folded contributions into summary row");
    Ok(new_total)
}

/// Point-in-time observed total: the sum over all live rows. Deleted rows
/// are excluded in soft mode and physically absent in hard mode, so the
/// same filter serves both.
pub async fn read_total<S: RowStore>(
    store: &S,
    config: &TallyConfig,
    counter_id: &str,
) -> Result<i64, TallyError> {
    let partition = store
        .read_partition(&config.table_name, counter_id, config.consistency)
        .await?;
    guard_fragmentation(config, counter_id, &partition)?;

    Ok(partition
        .rows
        .iter()
        .filter(|row| !row.deleted)
        .map(|row| row.value)
        .sum())
}

/// A single-partition read must come back in one page; fragmentation means
/// the store broke the isolation assumption the whole protocol leans on.
/// Always flagged loudly, fatal only when configured. Every read path runs
/// this, including the cumulative writer's read-modify-write.
pub(crate) fn guard_fragmentation(
    config: &TallyConfig,
    counter_id: &str,
    partition: &Partition,
) -> Result<(), TallyError> {
    if !partition.fragmented {
        return Ok(());
    }
    warn!(
        counter_id,
        rows = partition.rows.len(),
        "single-partition read spanned multiple pages"
    );
    if config.fail_on_fragmented_read {
        return Err(TallyError::PagedPartitionRead {
            counter_id: counter_id.to_owned(),
        });
    }
    Ok(())
}
