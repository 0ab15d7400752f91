use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A merchant shop connected to the platform.
///
/// The `id` doubles as the shop's platform domain, which is the natural key
/// the admin API addresses shops by.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopRecord {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub access_token: String,
    /// IANA timezone the shop reports in, e.g. "Europe/Rome".
    pub timezone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Set only after a sync pass whose consistency check succeeded.
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl ShopRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
        access_token: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: domain.into(),
            access_token: access_token.into(),
            timezone: timezone.into(),
            is_active: true,
            created_at: Utc::now(),
            last_sync_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Running => "running",
            SyncRunStatus::Completed => "completed",
            SyncRunStatus::Failed => "failed",
            SyncRunStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SyncRunStatus::Running),
            "completed" => Some(SyncRunStatus::Completed),
            "failed" => Some(SyncRunStatus::Failed),
            "timed_out" => Some(SyncRunStatus::TimedOut),
            _ => None,
        }
    }
}

/// One execution of a sync job, as recorded in the audit trail.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: i64,
    pub job_id: String,
    pub shop_id: String,
    pub job_type: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SyncRunStatus,
    pub error_message: Option<String>,
    /// What submitted the job: "api", "lifecycle:create", "health-sweep", etc.
    pub triggered_by: String,
}
