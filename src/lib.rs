//! `tally`: a lock-free distributed counter protocol over a partitioned
//! row store.
//!
//! Workers increment a counter concurrently without locks, consensus or
//! native counter types: each increment is an independent contribution row.
//! A single elected operator periodically folds live rows into one summary
//! row inside an atomic single-partition batch, keeping the partition
//! bounded, and readers sum whatever live rows are visible. The store is an
//! external collaborator behind [`store::RowStore`]; everything the protocol
//! needs from it is quorum reads/writes and the atomic batch.

pub mod config;
pub mod counter;
pub mod error;
pub mod model;
pub mod store;
pub mod workload;

pub use config::{CompactionStrategy, CounterMode, DeleteMode, TallyConfig};
pub use error::{TallyError, TallyErrorCode};
pub use store::{Consistency, RowStore, StoreError};
pub use workload::{CounterWorkload, Outcome, Worker};
