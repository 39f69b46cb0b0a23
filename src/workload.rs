//! Harness-facing surface: workload construction, one-time schema setup and
//! the per-worker operation interface.
//!
//! Every operation resolves to ok, fail, or indeterminate. Indeterminate
//! outcomes (timeouts, missing replicas) may have applied server-side; they
//! are reported as such and never retried here, because a blind retry of a
//! non-idempotent aggregation batch could double-apply deletions.

use crate::config::{CounterMode, TallyConfig};
use crate::counter::{AggregatorSlot, CounterStrategy, WriterContext};
use crate::error::TallyError;
use crate::model::SUMMARY_TOKEN;
use crate::store::RowStore;
use compact_str::CompactString;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Per-operation resolution reported to the harness.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    /// The store definitely did not apply the request.
    Fail(TallyError),
    /// The request may or may not have applied; downstream analysis must
    /// treat it as possibly-applied.
    Indeterminate(TallyError),
}

impl<T> Outcome<T> {
    fn from_result(result: Result<T, TallyError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(err) if err.is_indeterminate() => {
                warn!(error = %err, code = err.code_str(), "operation outcome is indeterminate");
                Outcome::Indeterminate(err)
            }
            Err(err) => Outcome::Fail(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Outcome::Indeterminate(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TallyError> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Fail(err) | Outcome::Indeterminate(err) => Some(err),
        }
    }
}

/// One counter's test run: shared store handle, aggregator slot and the
/// exactly-once schema gate. Workers are opened from here.
pub struct CounterWorkload<S: RowStore> {
    store: Arc<S>,
    config: TallyConfig,
    counter_id: CompactString,
    slot: Arc<AggregatorSlot>,
    schema_gate: OnceCell<()>,
    /// Per-writer sequence cells. Sequences are protocol state, not
    /// connection state: a reopened worker must continue where its writer id
    /// left off, or its op tokens would overwrite earlier contributions.
    seqs: Mutex<HashMap<CompactString, Arc<AtomicU64>>>,
}

impl<S: RowStore> CounterWorkload<S> {
    pub fn new(
        store: Arc<S>,
        config: TallyConfig,
        counter_id: impl Into<CompactString>,
    ) -> Result<Self, TallyError> {
        config.validate()?;
        let counter_id = counter_id.into();
        if counter_id.is_empty() {
            return Err(TallyError::InvalidCounterId {
                message: "counter id must not be empty".into(),
            });
        }
        Ok(Self {
            store,
            config,
            counter_id,
            slot: Arc::new(AggregatorSlot::new()),
            schema_gate: OnceCell::new(),
            seqs: Mutex::new(HashMap::new()),
        })
    }

    /// One-time schema creation, safe to call from every worker at startup.
    /// Concurrent callers coalesce onto a single `create_table`.
    pub async fn setup(&self) -> Result<(), TallyError> {
        self.schema_gate
            .get_or_try_init(|| async {
                let spec = self.config.table_spec();
                info!(table = %spec.name, rf = spec.replication_factor, "creating counter table");
                self.store.create_table(&spec).await
            })
            .await?;
        Ok(())
    }

    /// Acquire a worker context. Connection-scoped only; no protocol state
    /// survives a close besides the rows already written.
    pub fn open_worker(&self, worker_id: impl Into<CompactString>) -> Result<Worker<S>, TallyError> {
        let id = worker_id.into();
        if id.is_empty() {
            return Err(TallyError::InvalidWorkerId {
                worker_id: id.into(),
                message: "worker id must not be empty".into(),
            });
        }
        if id == SUMMARY_TOKEN {
            return Err(TallyError::InvalidWorkerId {
                worker_id: id.into(),
                message: "worker id collides with the summary sentinel".into(),
            });
        }
        let seq = Arc::clone(
            self.seqs
                .lock()
                .entry(id.clone())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        );
        Ok(Worker {
            id,
            seq,
            counter_id: self.counter_id.clone(),
            strategy: CounterStrategy::new(Arc::clone(&self.store), self.config.clone()),
            slot: Arc::clone(&self.slot),
        })
    }

    /// The elected aggregator, once the first append-log increment has run.
    pub fn aggregator(&self) -> Option<&str> {
        self.slot.aggregator()
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn counter_id(&self) -> &str {
        &self.counter_id
    }
}

/// One worker's handle on the counter.
///
/// The sequence cell is injected at open time and owned by the workload, so
/// a writer id's sequence survives close/reopen and op tokens are never
/// reused. `increment` takes `&mut self`, so a single handle is serialized
/// by ownership. Opening two handles under the same writer id reintroduces
/// the cumulative variant's read-modify-write race.
pub struct Worker<S: RowStore> {
    id: CompactString,
    seq: Arc<AtomicU64>,
    counter_id: CompactString,
    strategy: CounterStrategy<S>,
    slot: Arc<AggregatorSlot>,
}

impl<S: RowStore> Worker<S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Apply one increment; the strategy decides the path (see
    /// [`CounterStrategy::increment`]).
    pub async fn increment(&mut self, value: i64) -> Outcome<()> {
        let writer = WriterContext {
            worker_id: &self.id,
            seq: &self.seq,
            slot: &self.slot,
        };
        Outcome::from_result(self.strategy.increment(&self.counter_id, writer, value).await)
    }

    /// Observe the current total. No side effects, point-in-time only.
    pub async fn read(&self) -> Outcome<i64> {
        Outcome::from_result(self.strategy.read(&self.counter_id).await)
    }

    /// True once this worker has won the aggregator election. Meaningless
    /// (always false) in cumulative mode.
    pub fn is_aggregator(&self) -> bool {
        matches!(self.strategy, CounterStrategy::AppendLog(_))
            && self.slot.aggregator() == Some(self.id.as_str())
    }

    pub fn mode(&self) -> CounterMode {
        match self.strategy {
            CounterStrategy::AppendLog(_) => CounterMode::AppendLog,
            CounterStrategy::Cumulative(_) => CounterMode::Cumulative,
        }
    }

    /// Release the worker context.
    pub fn close(self) {}
}
