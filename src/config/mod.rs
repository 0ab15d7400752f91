mod file_config;

pub use file_config::{FileConfig, SyncConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub platform_url: Option<String>,
    pub platform_timeout_sec: u64,
    pub index_url: Option<String>,
    pub index_timeout_sec: u64,
    pub run_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// Base URL of the commerce platform API. Required.
    pub platform_url: String,
    pub platform_timeout_sec: u64,
    /// Base URL of the search index service. When absent the server runs
    /// against an in-memory index, which is only useful for development.
    pub index_url: Option<String>,
    pub index_timeout_sec: u64,
    pub run_retention_days: u64,
    pub prune_interval_hours: u64,

    // Feature configs (with defaults)
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let platform_url = match file.platform_url.or_else(|| cli.platform_url.clone()) {
            Some(url) => url,
            None => {
                bail!("platform_url must be specified via --platform-url or in config file")
            }
        };

        let platform_timeout_sec = file.platform_timeout_sec.unwrap_or(cli.platform_timeout_sec);
        let index_url = file.index_url.or_else(|| cli.index_url.clone());
        let index_timeout_sec = file.index_timeout_sec.unwrap_or(cli.index_timeout_sec);
        let run_retention_days = file.run_retention_days.unwrap_or(cli.run_retention_days);
        let prune_interval_hours = file.prune_interval_hours.unwrap_or(cli.prune_interval_hours);

        // Sync settings - merge file config with defaults
        let sync_file = file.sync.unwrap_or_default();
        let sync = SyncSettings {
            max_concurrent_jobs: sync_file.max_concurrent_jobs.unwrap_or(5),
            job_timeout_secs: sync_file.job_timeout_secs.unwrap_or(600),
            lock_lease_secs: sync_file.lock_lease_secs.unwrap_or(600),
            breaker_failure_threshold: sync_file.breaker_failure_threshold.unwrap_or(5),
            breaker_reset_secs: sync_file.breaker_reset_secs.unwrap_or(300),
            partition_concurrency: sync_file.partition_concurrency.unwrap_or(3),
            history_limit: sync_file.history_limit.unwrap_or(200),
            health_check_interval_secs: sync_file.health_check_interval_secs.unwrap_or(0),
            default_timezone: sync_file
                .default_timezone
                .unwrap_or_else(|| "UTC".to_string()),
            retry: SyncRetrySettings {
                max_retries: sync_file.max_retries.unwrap_or(3),
                initial_backoff_ms: sync_file.initial_backoff_ms.unwrap_or(200),
                max_backoff_ms: sync_file.max_backoff_ms.unwrap_or(5_000),
                backoff_multiplier: sync_file.backoff_multiplier.unwrap_or(2.0),
            },
        };

        if sync.max_concurrent_jobs == 0 {
            bail!("sync.max_concurrent_jobs must be at least 1");
        }
        if sync.partition_concurrency == 0 {
            bail!("sync.partition_concurrency must be at least 1");
        }
        if sync.lock_lease_secs <= 0 {
            bail!("sync.lock_lease_secs must be positive");
        }

        Ok(Self {
            db_dir,
            port,
            logging_level,
            platform_url,
            platform_timeout_sec,
            index_url,
            index_timeout_sec,
            run_retention_days,
            prune_interval_hours,
            sync,
        })
    }

    pub fn shops_db_path(&self) -> PathBuf {
        self.db_dir.join("shops.db")
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Ceiling on concurrently running jobs across all shops.
    pub max_concurrent_jobs: usize,
    /// Wall-clock budget for one job, retries included.
    pub job_timeout_secs: u64,
    /// Per-shop lock lease; a crashed holder blocks its shop for at most this long.
    pub lock_lease_secs: i64,
    /// Consecutive failures before a shop's circuit breaker opens.
    pub breaker_failure_threshold: u32,
    /// Quiet period after which an open breaker half-closes.
    pub breaker_reset_secs: i64,
    /// How many partitions one sync pass mirrors at the same time.
    pub partition_concurrency: usize,
    /// How many settled job results are kept for replay.
    pub history_limit: usize,
    /// Interval of the periodic health sweep; 0 disables it.
    pub health_check_interval_secs: u64,
    /// Timezone assigned to shops whose profile does not carry one.
    pub default_timezone: String,
    pub retry: SyncRetrySettings,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            job_timeout_secs: 600,
            lock_lease_secs: 600,
            breaker_failure_threshold: 5,
            breaker_reset_secs: 300,
            partition_concurrency: 3,
            history_limit: 200,
            health_check_interval_secs: 0,
            default_timezone: "UTC".to_string(),
            retry: SyncRetrySettings::default(),
        }
    }
}

/// Backoff schedule for failed partition attempts within a sync pass.
#[derive(Debug, Clone)]
pub struct SyncRetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for SyncRetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn minimal_cli(db_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(db_dir.path().to_path_buf()),
            platform_url: Some("http://platform:4000".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("HEADERS"),
            Some(RequestsLoggingLevel::Headers)
        ));
        // Invalid
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            port: 3001,
            logging_level: RequestsLoggingLevel::Headers,
            platform_url: Some("http://platform:4000".to_string()),
            platform_timeout_sec: 30,
            index_url: Some("http://index:4100".to_string()),
            index_timeout_sec: 20,
            run_retention_days: 60,
            prune_interval_hours: 12,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3001);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.platform_url, "http://platform:4000");
        assert_eq!(config.platform_timeout_sec, 30);
        assert_eq!(config.index_url, Some("http://index:4100".to_string()));
        assert_eq!(config.run_retention_days, 60);
        assert_eq!(config.prune_interval_hours, 12);
        // Sync settings fall back to defaults
        assert_eq!(config.sync.max_concurrent_jobs, 5);
        assert_eq!(config.sync.job_timeout_secs, 600);
        assert_eq!(config.sync.retry.max_retries, 3);
        assert_eq!(config.sync.default_timezone, "UTC");
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            platform_url: Some("http://cli-platform:4000".to_string()),
            ..Default::default()
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            platform_url: Some("http://toml-platform:4000".to_string()),
            sync: Some(SyncConfig {
                max_concurrent_jobs: Some(8),
                default_timezone: Some("Europe/Rome".to_string()),
                max_retries: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.platform_url, "http://toml-platform:4000");
        assert_eq!(config.sync.max_concurrent_jobs, 8);
        assert_eq!(config.sync.default_timezone, "Europe/Rome");
        assert_eq!(config.sync.retry.max_retries, 1);
        // Unset sync fields keep their defaults
        assert_eq!(config.sync.breaker_failure_threshold, 5);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig {
            platform_url: Some("http://platform:4000".to_string()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_missing_platform_url_error() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("platform_url must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            platform_url: Some("http://platform:4000".to_string()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        // Create a temporary file (not a directory)
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            platform_url: Some("http://platform:4000".to_string()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_rejects_zero_concurrency() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            sync: Some(SyncConfig {
                partition_concurrency: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = AppConfig::resolve(&minimal_cli(&temp_dir), Some(file_config));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("partition_concurrency"));
    }

    #[test]
    fn test_resolve_without_index_url_allows_in_memory_mode() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&minimal_cli(&temp_dir), None).unwrap();
        assert!(config.index_url.is_none());
    }

    #[test]
    fn test_db_path_helper() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&minimal_cli(&temp_dir), None).unwrap();
        assert_eq!(config.shops_db_path(), temp_dir.path().join("shops.db"));
    }
}
