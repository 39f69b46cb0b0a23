//! Row-store adapter contract.
//!
//! The counter protocol delegates every coordination concern except the
//! aggregator election to the store: reads and writes at a quorum-style
//! consistency level, and an atomic multi-row batch scoped to one partition.
//! A production adapter wraps a CQL-style client; [`memory::MemoryStore`]
//! is the in-process implementation used by tests and benches.

pub mod memory;

use crate::config::CompactionStrategy;
use crate::model::ContributionRow;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    One,
    Quorum,
    All,
}

impl Consistency {
    pub fn as_str(self) -> &'static str {
        match self {
            Consistency::One => "one",
            Consistency::Quorum => "quorum",
            Consistency::All => "all",
        }
    }
}

/// Schema pass-throughs handed to the adapter's one-time table creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub replication_factor: u8,
    pub compaction: CompactionStrategy,
}

/// One mutation inside an atomic single-partition batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowMutation {
    Upsert(ContributionRow),
    /// Physically remove the row (hard delete mode).
    Delete { token: CompactString },
    /// Set `deleted = true`, leaving value and payload in place (soft mode).
    MarkDeleted { token: CompactString },
}

/// Result of a full-partition read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub rows: Vec<ContributionRow>,
    /// True when the store split what must be a single-page read across
    /// multiple result pages. The protocol treats this as a violation of its
    /// isolation assumption and flags it distinctly.
    pub fragmented: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store explicitly refused the request; it definitely did not apply.
    #[error("store rejected the request: {0}")]
    Rejected(String),
    /// No response in time. The request may have applied server-side.
    #[error("store request timed out")]
    Timeout,
    /// Not enough replicas answered. The request may have partially applied.
    #[error("replicas unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Distinguishes "definitely did not happen" from "maybe happened".
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Unavailable(_))
    }
}

/// Blocking request/response access to a partitioned row store.
///
/// Every call resolves to a definite acknowledgement or a [`StoreError`];
/// the implementation must not retry internally, because the caller has to
/// see indeterminate outcomes as such.
#[allow(async_fn_in_trait)]
pub trait RowStore: Send + Sync {
    /// One-time schema creation. Must tolerate concurrent/repeated calls.
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError>;

    /// Read every row stored under one partition key.
    async fn read_partition(
        &self,
        table: &str,
        counter_id: &str,
        consistency: Consistency,
    ) -> Result<Partition, StoreError>;

    /// Insert or overwrite a single row.
    async fn write(
        &self,
        table: &str,
        row: ContributionRow,
        consistency: Consistency,
    ) -> Result<(), StoreError>;

    /// Apply all mutations to one partition as a single indivisible unit.
    /// Partial application must be impossible; mutations naming any other
    /// partition must be rejected outright.
    async fn atomic_batch(
        &self,
        table: &str,
        counter_id: &str,
        mutations: Vec<RowMutation>,
        consistency: Consistency,
    ) -> Result<(), StoreError>;
}
