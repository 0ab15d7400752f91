//! Sync pass execution against the platform and the index.
//!
//! The executor runs one pass for one shop: validate credentials, mirror each
//! partition, then verify the index ended up complete. It knows nothing about
//! locks, breakers, or capacity; the dispatcher owns those.

mod executor;
mod models;
mod retry_policy;
mod transform;

pub use executor::SyncExecutor;
pub use models::{PartitionOutcome, SyncError, SyncOptions, SyncOutcome, SyncStepError};
pub use retry_policy::RetryPolicy;
