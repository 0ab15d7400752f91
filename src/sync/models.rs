use crate::platform::PlatformError;
use crate::search_index::{IndexError, Partition};
use serde::Serialize;
use thiserror::Error;

/// Why a sync job failed or was rejected.
///
/// This is the vocabulary the API, the run audit trail, and metrics all share,
/// so variants carry only what callers act on; free-form diagnostic text goes
/// through `Internal` or the per-partition outcome messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SyncError {
    #[error("platform credentials are invalid or expired")]
    AuthInvalid,
    #[error("platform rate limit hit")]
    RateLimited,
    #[error("network operation timed out")]
    NetworkTimeout,
    #[error("another job holds the shop lock (holder {holder_id})")]
    LockHeld { holder_id: String },
    #[error("circuit breaker is open for this shop")]
    CircuitOpen,
    #[error("dispatcher is at its concurrency ceiling")]
    CapacityExceeded,
    #[error("partition {partition} is missing from the index")]
    PartitionMissing { partition: Partition },
    #[error("job exceeded its wall clock budget")]
    Timeout,
    #[error("shop is not registered")]
    ShopNotFound,
    #[error("{failed} of {attempted} partitions failed")]
    PartitionsFailed { failed: usize, attempted: usize },
    #[error("sync aborted: {0}")]
    Internal(String),
}

impl SyncError {
    /// Short stable tag for metrics labels and API reason fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::AuthInvalid => "auth_invalid",
            SyncError::RateLimited => "rate_limited",
            SyncError::NetworkTimeout => "network_timeout",
            SyncError::LockHeld { .. } => "lock_held",
            SyncError::CircuitOpen => "circuit_open",
            SyncError::CapacityExceeded => "capacity_exceeded",
            SyncError::PartitionMissing { .. } => "partition_missing",
            SyncError::Timeout => "timeout",
            SyncError::ShopNotFound => "shop_not_found",
            SyncError::PartitionsFailed { .. } => "partitions_failed",
            SyncError::Internal(_) => "internal",
        }
    }
}

impl From<PlatformError> for SyncError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::AuthInvalid => SyncError::AuthInvalid,
            PlatformError::RateLimited => SyncError::RateLimited,
            PlatformError::Timeout => SyncError::NetworkTimeout,
            PlatformError::Network(_) => SyncError::NetworkTimeout,
            PlatformError::Api { status, message } => {
                if status >= 500 {
                    SyncError::NetworkTimeout
                } else {
                    SyncError::Internal(format!("platform returned {status}: {message}"))
                }
            }
        }
    }
}

/// Error from a single partition attempt, classified for retry decisions.
#[derive(Debug, Clone)]
pub struct SyncStepError {
    pub message: String,
    pub retryable: bool,
}

impl From<PlatformError> for SyncStepError {
    fn from(err: PlatformError) -> Self {
        Self {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

impl From<IndexError> for SyncStepError {
    fn from(err: IndexError) -> Self {
        Self {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// What a sync pass should do, derived from the job type.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delete every partition before mirroring, to flush stale documents.
    pub teardown_first: bool,
    pub partitions: Vec<Partition>,
    pub consistency_check: bool,
    /// Per-partition retry ceiling for this pass. `None` defers to the
    /// executor's policy; a value only ever lowers the ceiling.
    pub max_retries: Option<u32>,
}

impl SyncOptions {
    pub fn full() -> Self {
        Self {
            teardown_first: false,
            partitions: Partition::ALL.to_vec(),
            consistency_check: true,
            max_retries: None,
        }
    }

    pub fn cleanup() -> Self {
        Self {
            teardown_first: true,
            partitions: Partition::ALL.to_vec(),
            consistency_check: true,
            max_retries: None,
        }
    }

    pub fn incremental(partitions: Vec<Partition>) -> Self {
        Self {
            teardown_first: false,
            partitions,
            consistency_check: true,
            max_retries: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Result of mirroring one partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionOutcome {
    pub partition: Partition,
    pub success: bool,
    pub documents: usize,
    pub error: Option<String>,
}

/// Result of one sync pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub partitions_attempted: usize,
    pub partitions_succeeded: usize,
    pub documents_indexed: usize,
    pub partition_outcomes: Vec<PartitionOutcome>,
    /// Human-readable failure descriptions, empty when the pass fully succeeded.
    pub errors: Vec<String>,
    /// Step-by-step trace of what the pass did, in order.
    pub operations: Vec<String>,
    /// True when every partition existed (or was repaired) after the pass.
    pub consistency_ok: bool,
}

impl SyncOutcome {
    pub fn is_fully_successful(&self) -> bool {
        self.errors.is_empty()
    }
}
