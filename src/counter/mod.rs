//! The two counter strategies and their shared machinery.
//!
//! Both variants expose the same capability (increment, read) over the same
//! row schema; which one a workload runs is decided once at construction.

pub mod append_log;
pub mod cumulative;
pub mod election;
pub mod fold;

pub use append_log::AppendLogCounter;
pub use cumulative::CumulativeCounter;
pub use election::AggregatorSlot;

use crate::config::{CounterMode, TallyConfig};
use crate::error::TallyError;
use crate::store::RowStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-worker context threaded through an increment: the writer's identity,
/// its shared sequence cell (owned by the workload so it survives worker
/// close/reopen), and the election slot.
pub struct WriterContext<'a> {
    pub worker_id: &'a str,
    pub seq: &'a AtomicU64,
    pub slot: &'a AggregatorSlot,
}

/// A counter strategy selected at workload construction time. Both variants
/// expose the same capability: increment and read.
pub enum CounterStrategy<S> {
    AppendLog(AppendLogCounter<S>),
    Cumulative(CumulativeCounter<S>),
}

impl<S: RowStore> CounterStrategy<S> {
    pub fn new(store: Arc<S>, config: TallyConfig) -> Self {
        match config.mode {
            CounterMode::AppendLog => Self::AppendLog(AppendLogCounter::new(store, config)),
            CounterMode::Cumulative => Self::Cumulative(CumulativeCounter::new(store, config)),
        }
    }

    /// Apply one increment. In append-log mode the aggregator slot decides
    /// the path: the winner's increments run fold rounds, everyone else
    /// blind-appends under the next sequence number.
    pub async fn increment(
        &self,
        counter_id: &str,
        writer: WriterContext<'_>,
        value: i64,
    ) -> Result<(), TallyError> {
        match self {
            Self::AppendLog(counter) => {
                if writer.slot.claim(writer.worker_id) == writer.worker_id {
                    counter.fold(counter_id, value).await.map(|_| ())
                } else {
                    let seq = writer.seq.fetch_add(1, Ordering::Relaxed) + 1;
                    counter.append(counter_id, writer.worker_id, seq, value).await
                }
            }
            Self::Cumulative(counter) => counter
                .accumulate(counter_id, writer.worker_id, value)
                .await
                .map(|_| ()),
        }
    }

    pub async fn read(&self, counter_id: &str) -> Result<i64, TallyError> {
        match self {
            Self::AppendLog(counter) => counter.read(counter_id).await,
            Self::Cumulative(counter) => counter.read(counter_id).await,
        }
    }
}
