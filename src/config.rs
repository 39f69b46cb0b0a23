use crate::error::TallyError;
use crate::store::{Consistency, TableSpec};

/// Hard cap on the inert payload attached to contribution rows. The payload
/// is load-shaping only; anything larger points at a misconfigured harness.
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CounterMode {
    /// Operation-based: one uniquely keyed row per increment, folded into a
    /// summary row by the elected aggregator.
    AppendLog,
    /// State-based: one row per writer holding its cumulative total,
    /// overwritten on every increment. Never aggregated, never deleted.
    Cumulative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeleteMode {
    /// Physically remove folded rows inside the aggregation batch.
    Hard,
    /// Mark folded rows `deleted = true` and leave them in place, so the
    /// store never has to pay for its own tombstones.
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum CompactionStrategy {
    #[default]
    SizeTiered,
    Leveled,
    TimeWindow,
}

impl CompactionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            CompactionStrategy::SizeTiered => "size_tiered",
            CompactionStrategy::Leveled => "leveled",
            CompactionStrategy::TimeWindow => "time_window",
        }
    }
}

/// Runtime configuration for one counter workload.
///
/// Replication factor and compaction strategy are pass-throughs to the store
/// adapter's schema setup; the core never interprets them.
#[derive(Debug, Clone)]
pub struct TallyConfig {
    pub table_name: String,
    pub mode: CounterMode,
    pub delete_mode: DeleteMode,
    pub payload_size: usize,
    pub replication_factor: u8,
    pub compaction: CompactionStrategy,
    pub consistency: Consistency,
    /// When true, a fragmented single-partition read fails the operation
    /// instead of only being logged.
    pub fail_on_fragmented_read: bool,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            table_name: "counter_contributions".into(),
            mode: CounterMode::AppendLog,
            delete_mode: DeleteMode::Hard,
            payload_size: 16,
            replication_factor: 3,
            compaction: CompactionStrategy::SizeTiered,
            consistency: Consistency::Quorum,
            fail_on_fragmented_read: false,
        }
    }
}

impl TallyConfig {
    pub fn soft_delete() -> Self {
        Self {
            delete_mode: DeleteMode::Soft,
            ..Self::default()
        }
    }

    pub fn cumulative() -> Self {
        Self {
            mode: CounterMode::Cumulative,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TallyError> {
        if self.table_name.is_empty() {
            return Err(TallyError::InvalidConfig {
                message: "table_name must not be empty".into(),
            });
        }
        if self.replication_factor == 0 {
            return Err(TallyError::InvalidConfig {
                message: "replication_factor must be at least 1".into(),
            });
        }
        if self.payload_size > MAX_PAYLOAD_BYTES {
            return Err(TallyError::InvalidConfig {
                message: format!(
                    "payload_size {} exceeds maximum {}",
                    self.payload_size, MAX_PAYLOAD_BYTES
                ),
            });
        }
        Ok(())
    }

    pub fn table_spec(&self) -> TableSpec {
        TableSpec {
            name: self.table_name.clone(),
            replication_factor: self.replication_factor,
            compaction: self.compaction,
        }
    }
}
