use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shoplens_sync_server::clock::SystemClock;
use shoplens_sync_server::config::{AppConfig, CliConfig, FileConfig};
use shoplens_sync_server::jobs::{
    CircuitBreakerRegistry, DispatcherConfig, JobDispatcher, LockManager,
};
use shoplens_sync_server::lifecycle::ShopLifecycle;
use shoplens_sync_server::maintenance;
use shoplens_sync_server::platform::{HttpPlatformClient, PlatformClient};
use shoplens_sync_server::search_index::{HttpSearchIndex, InMemorySearchIndex, SearchIndex};
use shoplens_sync_server::server::state::ServerState;
use shoplens_sync_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use shoplens_sync_server::shop_store::{ShopStore, SqliteShopStore};
use shoplens_sync_server::sync::{RetryPolicy, SyncExecutor};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory for the SQLite databases.
    #[clap(value_parser = parse_path)]
    pub db_dir: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Base URL of the commerce platform API.
    #[clap(long)]
    pub platform_url: Option<String>,

    /// Timeout in seconds for platform requests.
    #[clap(long, default_value_t = 30)]
    pub platform_timeout_sec: u64,

    /// Base URL of the search index service. Omit to run on the in-memory
    /// index, which loses its content on restart.
    #[clap(long)]
    pub index_url: Option<String>,

    /// Timeout in seconds for index requests.
    #[clap(long, default_value_t = 30)]
    pub index_timeout_sec: u64,

    /// Number of days to retain sync run rows before pruning. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 90)]
    pub run_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if run_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// Path to a TOML config file. Values in the file override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config = CliConfig {
        db_dir: Some(cli_args.db_dir),
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        platform_url: cli_args.platform_url,
        platform_timeout_sec: cli_args.platform_timeout_sec,
        index_url: cli_args.index_url,
        index_timeout_sec: cli_args.index_timeout_sec,
        run_retention_days: cli_args.run_retention_days,
        prune_interval_hours: cli_args.prune_interval_hours,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening shop database at {:?}...", config.shops_db_path());
    let shop_store = Arc::new(SqliteShopStore::new(config.shops_db_path())?);

    // Runs left behind by a previous process would show as running forever.
    let stale = shop_store.mark_stale_runs_failed()?;
    if stale > 0 {
        info!("Marked {} interrupted sync runs as failed", stale);
    }

    let platform: Arc<dyn PlatformClient> = Arc::new(HttpPlatformClient::new(
        config.platform_url.clone(),
        config.platform_timeout_sec,
    ));

    let search_index: Arc<dyn SearchIndex> = match &config.index_url {
        Some(url) => {
            info!("Search index service configured at {}", url);
            Arc::new(HttpSearchIndex::new(url.clone(), config.index_timeout_sec))
        }
        None => {
            info!("No index URL configured, running on the in-memory index");
            Arc::new(InMemorySearchIndex::new())
        }
    };

    let clock = Arc::new(SystemClock);
    let executor = SyncExecutor::new(
        platform.clone(),
        search_index.clone(),
        shop_store.clone(),
        RetryPolicy::new(&config.sync.retry),
        config.sync.partition_concurrency,
        clock.clone(),
    );
    let locks = Arc::new(LockManager::new(config.sync.lock_lease_secs, clock.clone()));
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        config.sync.breaker_failure_threshold,
        config.sync.breaker_reset_secs,
        clock.clone(),
    ));
    let dispatcher = JobDispatcher::new(
        executor,
        shop_store.clone(),
        locks.clone(),
        breakers.clone(),
        DispatcherConfig {
            max_concurrent_jobs: config.sync.max_concurrent_jobs,
            job_timeout: Duration::from_secs(config.sync.job_timeout_secs),
            history_limit: config.sync.history_limit,
        },
        clock.clone(),
    );
    let lifecycle = Arc::new(ShopLifecycle::new(
        platform,
        shop_store.clone(),
        dispatcher.clone(),
        config.sync.default_timezone.clone(),
    ));

    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
        });
    }

    if config.run_retention_days > 0 {
        info!(
            "Run pruning enabled: retaining {} days, pruning every {} hours",
            config.run_retention_days, config.prune_interval_hours
        );
        tokio::spawn(maintenance::run_sync_run_pruner(
            shop_store.clone(),
            clock.clone(),
            config.run_retention_days,
            config.prune_interval_hours,
            shutdown.child_token(),
        ));
    }

    if config.sync.health_check_interval_secs > 0 {
        info!(
            "Health sweep enabled every {}s",
            config.sync.health_check_interval_secs
        );
        tokio::spawn(maintenance::run_health_sweep(
            shop_store.clone(),
            dispatcher.clone(),
            config.sync.health_check_interval_secs,
            shutdown.child_token(),
        ));
    }

    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
        },
        start_time: Instant::now(),
        dispatcher,
        lifecycle,
        shop_store,
        search_index,
        locks,
        breakers,
        hash: env!("GIT_HASH").to_string(),
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(state, shutdown).await
}
