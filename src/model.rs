use compact_str::{format_compact, CompactString};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reserved clustering token for the summary row. At most one row per
/// counter may carry it; worker ids are validated against it at open time.
pub const SUMMARY_TOKEN: &str = "summary";

/// Clustering token for an operation-based contribution:
/// a stable writer id plus a strictly increasing per-writer sequence number.
/// Distinct writers produce disjoint tokens without any coordination.
pub fn op_token(writer_id: &str, seq: u64) -> CompactString {
    format_compact!("{writer_id}-{seq}")
}

/// Inert payload bytes attached to freshly written rows. Purely
/// load-shaping; the protocol never inspects the contents.
pub fn fresh_payload(size: usize) -> Vec<u8> {
    let mut payload = vec![0u8; size];
    rand::thread_rng().fill(payload.as_mut_slice());
    payload
}

/// One stored record for a counter: either a single increment, a writer's
/// cumulative total, or the folded aggregate (summary row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRow {
    /// Partition key.
    pub counter_id: CompactString,
    /// Clustering key: op token, writer id, or [`SUMMARY_TOKEN`].
    pub token: CompactString,
    pub value: i64,
    pub deleted: bool,
    pub payload: Vec<u8>,
}

impl ContributionRow {
    pub fn contribution(
        counter_id: impl Into<CompactString>,
        token: impl Into<CompactString>,
        value: i64,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            counter_id: counter_id.into(),
            token: token.into(),
            value,
            deleted: false,
            payload,
        }
    }

    pub fn summary(counter_id: impl Into<CompactString>, value: i64, payload: Vec<u8>) -> Self {
        Self {
            counter_id: counter_id.into(),
            token: SUMMARY_TOKEN.into(),
            value,
            deleted: false,
            payload,
        }
    }

    pub fn is_summary(&self) -> bool {
        self.token == SUMMARY_TOKEN
    }
}
