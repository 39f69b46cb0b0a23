use compact_str::CompactString;
use std::sync::OnceLock;

/// One-shot, lock-free aggregator election.
///
/// The slot starts empty and is claimed with an atomic set-if-unset: exactly
/// one caller over the lifetime of the run sees its own id win, everyone else
/// observes the winner and proceeds as an ordinary writer. There is no
/// re-election and no takeover; a dead aggregator simply means aggregation
/// stops while rows keep accumulating and stay individually counted.
#[derive(Debug, Default)]
pub struct AggregatorSlot {
    slot: OnceLock<CompactString>,
}

impl AggregatorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose `worker_id` as the aggregator and return whoever holds the
    /// slot afterwards. Idempotent for the winner, stable for everyone.
    pub fn claim(&self, worker_id: &str) -> &str {
        self.slot
            .get_or_init(|| CompactString::from(worker_id))
            .as_str()
    }

    /// The elected aggregator, if the election has happened yet.
    pub fn aggregator(&self) -> Option<&str> {
        self.slot.get().map(CompactString::as_str)
    }
}
