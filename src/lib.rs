//! Shoplens Sync Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod clock;
pub mod config;
pub mod jobs;
pub mod lifecycle;
pub mod maintenance;
pub mod platform;
pub mod search_index;
pub mod server;
pub mod shop_store;
pub mod sqlite_persistence;
pub mod sync;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use jobs::{JobDispatcher, SyncJob, SyncJobType};
pub use server::{run_server, RequestsLoggingLevel};
pub use shop_store::{ShopStore, SqliteShopStore};
pub use sync::SyncExecutor;
