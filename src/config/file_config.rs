use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub platform_url: Option<String>,
    pub platform_timeout_sec: Option<u64>,
    pub index_url: Option<String>,
    pub index_timeout_sec: Option<u64>,
    pub run_retention_days: Option<u64>,
    pub prune_interval_hours: Option<u64>,

    // Feature configs
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub max_concurrent_jobs: Option<usize>,
    pub job_timeout_secs: Option<u64>,
    pub lock_lease_secs: Option<i64>,
    pub breaker_failure_threshold: Option<u32>,
    pub breaker_reset_secs: Option<i64>,
    pub partition_concurrency: Option<usize>,
    pub history_limit: Option<usize>,
    pub health_check_interval_secs: Option<u64>,
    pub default_timezone: Option<String>,
    // Per-partition retry settings
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
