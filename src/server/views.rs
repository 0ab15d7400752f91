//! JSON views returned by the HTTP API.
//!
//! Timestamps are rendered as RFC 3339 strings. Access tokens never leave
//! the server, so [`ShopView`] has no credential field.

use serde::Serialize;

use crate::jobs::{BreakerSnapshot, JobResult, RunningJobInfo};
use crate::shop_store::{ShopRecord, SyncRun};
use crate::sync::SyncOutcome;

#[derive(Debug, Serialize)]
pub struct ShopView {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub timezone: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_sync_at: Option<String>,
}

impl From<&ShopRecord> for ShopView {
    fn from(shop: &ShopRecord) -> Self {
        ShopView {
            id: shop.id.clone(),
            name: shop.name.clone(),
            domain: shop.domain.clone(),
            timezone: shop.timezone.clone(),
            is_active: shop.is_active,
            created_at: shop.created_at.to_rfc3339(),
            last_sync_at: shop.last_sync_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResultView {
    pub job_id: String,
    pub shop_id: String,
    pub job_type: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub operations_log: Vec<String>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub lock_acquired: bool,
    pub lock_holder_id: Option<String>,
    pub outcome: Option<SyncOutcome>,
    pub finished_at: String,
}

impl From<&JobResult> for JobResultView {
    fn from(result: &JobResult) -> Self {
        JobResultView {
            job_id: result.job_id.clone(),
            shop_id: result.shop_id.clone(),
            job_type: result.job_type.as_str().to_string(),
            success: result.success,
            execution_time_ms: result.execution_time_ms,
            operations_log: result.operations_log.clone(),
            error_kind: result.error.as_ref().map(|e| e.kind().to_string()),
            error: result.error.as_ref().map(|e| e.to_string()),
            lock_acquired: result.lock_acquired,
            lock_holder_id: result.lock_holder_id.clone(),
            outcome: result.outcome.clone(),
            finished_at: result.finished_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunningJobView {
    pub job_id: String,
    pub shop_id: String,
    pub job_type: String,
    pub created_at: String,
    pub started_at: String,
}

impl From<&RunningJobInfo> for RunningJobView {
    fn from(info: &RunningJobInfo) -> Self {
        RunningJobView {
            job_id: info.job_id.clone(),
            shop_id: info.shop_id.clone(),
            job_type: info.job_type.as_str().to_string(),
            created_at: info.created_at.to_rfc3339(),
            started_at: info.started_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncRunView {
    pub id: i64,
    pub job_id: String,
    pub shop_id: String,
    pub job_type: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

impl From<&SyncRun> for SyncRunView {
    fn from(run: &SyncRun) -> Self {
        SyncRunView {
            id: run.id,
            job_id: run.job_id.clone(),
            shop_id: run.shop_id.clone(),
            job_type: run.job_type.clone(),
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.map(|t| t.to_rfc3339()),
            status: run.status.as_str().to_string(),
            error_message: run.error_message.clone(),
            triggered_by: run.triggered_by.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BreakerView {
    pub is_open: bool,
    pub failure_count: u32,
    pub last_failure_at: Option<String>,
}

impl From<&BreakerSnapshot> for BreakerView {
    fn from(snapshot: &BreakerSnapshot) -> Self {
        BreakerView {
            is_open: snapshot.is_open,
            failure_count: snapshot.failure_count,
            last_failure_at: snapshot.last_failure_at.map(|t| t.to_rfc3339()),
        }
    }
}
