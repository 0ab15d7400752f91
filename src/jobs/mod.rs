//! Job submission and scheduling for shop sync work.
//!
//! The dispatcher is the only component that starts sync passes. It owns
//! admission control (dedup, capacity, circuit breakers, per-shop locks)
//! and settlement (lock release, breaker bookkeeping, run history).

mod circuit_breaker;
mod dispatcher;
mod lock_manager;
mod models;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreakerRegistry};
pub use dispatcher::{DispatcherConfig, JobDispatcher, SubmitOutcome};
pub use lock_manager::{LockHeld, LockManager, LockNotOwned, ShopLock};
pub use models::{JobPriority, JobResult, RunningJobInfo, SyncJob, SyncJobType};
