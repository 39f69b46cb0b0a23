use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyErrorCode {
    InvalidConfig,
    InvalidCounterId,
    InvalidWorkerId,
    StoreRejected,
    StoreTimeout,
    StoreUnavailable,
    PagedPartitionRead,
}

impl TallyErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            TallyErrorCode::InvalidConfig => "invalid_config",
            TallyErrorCode::InvalidCounterId => "invalid_counter_id",
            TallyErrorCode::InvalidWorkerId => "invalid_worker_id",
            TallyErrorCode::StoreRejected => "store_rejected",
            TallyErrorCode::StoreTimeout => "store_timeout",
            TallyErrorCode::StoreUnavailable => "store_unavailable",
            TallyErrorCode::PagedPartitionRead => "paged_partition_read",
        }
    }
}

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("invalid counter id: {message}")]
    InvalidCounterId { message: String },
    #[error("invalid worker id '{worker_id}': {message}")]
    InvalidWorkerId { worker_id: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("single-partition read for counter '{counter_id}' spanned multiple result pages")]
    PagedPartitionRead { counter_id: String },
}

impl TallyError {
    pub fn code(&self) -> TallyErrorCode {
        match self {
            TallyError::InvalidConfig { .. } => TallyErrorCode::InvalidConfig,
            TallyError::InvalidCounterId { .. } => TallyErrorCode::InvalidCounterId,
            TallyError::InvalidWorkerId { .. } => TallyErrorCode::InvalidWorkerId,
            TallyError::Store(err) => match err {
                StoreError::Rejected(_) => TallyErrorCode::StoreRejected,
                StoreError::Timeout => TallyErrorCode::StoreTimeout,
                StoreError::Unavailable(_) => TallyErrorCode::StoreUnavailable,
            },
            TallyError::PagedPartitionRead { .. } => TallyErrorCode::PagedPartitionRead,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// True when the underlying request may have applied server-side despite
    /// the error. Such outcomes must never be collapsed into plain failure:
    /// downstream history analysis has to treat them as possibly-applied.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, TallyError::Store(err) if err.is_indeterminate())
    }
}
