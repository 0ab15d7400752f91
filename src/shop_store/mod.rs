mod models;
mod schema;
mod sqlite_shop_store;

pub use models::*;
pub use schema::SHOP_VERSIONED_SCHEMAS;
pub use sqlite_shop_store::SqliteShopStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Persistence for connected shops and for the sync run audit trail.
///
/// The searchable documents themselves live in the index; this store only
/// tracks which shops exist, their platform credentials, and what sync work
/// has run against them.
pub trait ShopStore: Send + Sync {
    // Shop records
    fn insert_shop(&self, shop: &ShopRecord) -> Result<()>;
    fn get_shop(&self, shop_id: &str) -> Result<Option<ShopRecord>>;
    fn list_shops(&self, only_active: bool) -> Result<Vec<ShopRecord>>;
    fn set_shop_active(&self, shop_id: &str, is_active: bool) -> Result<()>;
    fn update_access_token(&self, shop_id: &str, access_token: &str) -> Result<()>;
    fn update_last_sync_at(&self, shop_id: &str, at: DateTime<Utc>) -> Result<()>;
    fn delete_shop(&self, shop_id: &str) -> Result<()>;

    // Sync run audit trail
    fn record_run_start(
        &self,
        job_id: &str,
        shop_id: &str,
        job_type: &str,
        triggered_by: &str,
    ) -> Result<i64>;
    fn record_run_finish(
        &self,
        run_id: i64,
        status: SyncRunStatus,
        error_message: Option<String>,
    ) -> Result<()>;
    fn get_runs_for_shop(&self, shop_id: &str, limit: usize) -> Result<Vec<SyncRun>>;
    fn get_last_run(&self, shop_id: &str) -> Result<Option<SyncRun>>;
    fn mark_stale_runs_failed(&self) -> Result<usize>;
    fn prune_runs_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
