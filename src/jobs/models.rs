use crate::search_index::Partition;
use crate::sync::{SyncError, SyncOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncJobType {
    FullSync,        // Mirror every partition from the platform
    CleanupResync,   // Tear the index down first, then mirror everything
    IncrementalSync, // Refresh a subset of partitions
    IndexTeardown,   // Remove the shop's partitions entirely
    HealthCheck,     // Read-only credential and partition verification
}

impl SyncJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobType::FullSync => "FULL_SYNC",
            SyncJobType::CleanupResync => "CLEANUP_RESYNC",
            SyncJobType::IncrementalSync => "INCREMENTAL_SYNC",
            SyncJobType::IndexTeardown => "INDEX_TEARDOWN",
            SyncJobType::HealthCheck => "HEALTH_CHECK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FULL_SYNC" => Some(SyncJobType::FullSync),
            "CLEANUP_RESYNC" => Some(SyncJobType::CleanupResync),
            "INCREMENTAL_SYNC" => Some(SyncJobType::IncrementalSync),
            "INDEX_TEARDOWN" => Some(SyncJobType::IndexTeardown),
            "HEALTH_CHECK" => Some(SyncJobType::HealthCheck),
            _ => None,
        }
    }

    /// Teardowns only touch the index, so they run even when the shop's
    /// credentials are gone or revoked.
    pub fn needs_credentials(&self) -> bool {
        !matches!(self, SyncJobType::IndexTeardown)
    }
}

/// Reported on jobs and in status responses. Admission is first come first
/// served; priority does not reorder anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    High,
    Medium,
    Low,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::High => "HIGH",
            JobPriority::Medium => "MEDIUM",
            JobPriority::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(JobPriority::High),
            "MEDIUM" => Some(JobPriority::Medium),
            "LOW" => Some(JobPriority::Low),
            _ => None,
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Medium
    }
}

/// One unit of sync work for one shop.
#[derive(Debug, Clone)]
pub struct SyncJob {
    /// Caller-visible identity. Submitting the same id twice attaches to the
    /// running job or replays the settled result.
    pub job_id: String,
    pub shop_id: String,
    pub job_type: SyncJobType,
    pub priority: JobPriority,
    /// Retries already charged to this request by earlier submissions.
    pub retry_count: u32,
    /// Per-partition inline retry ceiling for this job. `None` defers to the
    /// configured retry policy.
    pub max_retries: Option<u32>,
    /// Partitions an incremental sync should refresh. `None` means all.
    pub target_partitions: Option<Vec<Partition>>,
    /// Free-form origin tag, e.g. "api" or "lifecycle:create".
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(shop_id: impl Into<String>, job_type: SyncJobType) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            shop_id: shop_id.into(),
            job_type,
            priority: JobPriority::default(),
            retry_count: 0,
            max_retries: None,
            target_partitions: None,
            triggered_by: "api".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_partitions(mut self, partitions: Vec<Partition>) -> Self {
        self.target_partitions = Some(partitions);
        self
    }

    pub fn with_triggered_by(mut self, triggered_by: impl Into<String>) -> Self {
        self.triggered_by = triggered_by.into();
        self
    }

    /// Inline retries this job may still spend, when it carries its own
    /// ceiling instead of deferring to the configured policy.
    pub fn retry_budget(&self) -> Option<u32> {
        self.max_retries
            .map(|max| max.saturating_sub(self.retry_count))
    }
}

/// Settled result of one job, kept in the dispatcher's bounded history.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub shop_id: String,
    pub job_type: SyncJobType,
    pub success: bool,
    pub execution_time_ms: u64,
    /// Ordered trace of what the job did, for status responses and debugging.
    pub operations_log: Vec<String>,
    pub error: Option<SyncError>,
    pub lock_acquired: bool,
    pub lock_holder_id: Option<String>,
    pub outcome: Option<SyncOutcome>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    /// Result for a job refused at admission, before any lock was taken.
    pub(crate) fn rejected(job: &SyncJob, error: SyncError, now: DateTime<Utc>) -> Self {
        let lock_holder_id = match &error {
            SyncError::LockHeld { holder_id } => Some(holder_id.clone()),
            _ => None,
        };
        Self {
            job_id: job.job_id.clone(),
            shop_id: job.shop_id.clone(),
            job_type: job.job_type,
            success: false,
            execution_time_ms: 0,
            operations_log: vec![format!("rejected:{}", error.kind())],
            error: Some(error),
            lock_acquired: false,
            lock_holder_id,
            outcome: None,
            finished_at: now,
        }
    }
}

/// Point-in-time view of a job the dispatcher is currently running.
#[derive(Debug, Clone)]
pub struct RunningJobInfo {
    pub job_id: String,
    pub shop_id: String,
    pub job_type: SyncJobType,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}
