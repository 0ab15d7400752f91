//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test sync servers.
//! Each test gets an isolated server with its own platform stub, shop
//! database and in-memory search index.

use super::constants::*;
use super::platform_stub::PlatformStub;
use shoplens_sync_server::clock::SystemClock;
use shoplens_sync_server::jobs::{
    CircuitBreakerRegistry, DispatcherConfig, JobDispatcher, LockManager,
};
use shoplens_sync_server::lifecycle::ShopLifecycle;
use shoplens_sync_server::platform::{HttpPlatformClient, PlatformClient};
use shoplens_sync_server::search_index::{InMemorySearchIndex, SearchIndex};
use shoplens_sync_server::server::metrics;
use shoplens_sync_server::server::state::ServerState;
use shoplens_sync_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use shoplens_sync_server::shop_store::{ShopStore, SqliteShopStore};
use shoplens_sync_server::sync::{RetryPolicy, SyncExecutor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated shop registry and index
///
/// When dropped, the server gracefully shuts down and temp resources
/// are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The fake merchant platform this server syncs from
    pub platform: PlatformStub,

    /// Shop store for direct database access in tests
    pub shop_store: Arc<SqliteShopStore>,

    /// Search index for direct document inspection in tests
    pub search_index: Arc<InMemorySearchIndex>,

    /// Dispatcher handle for watching jobs without going through HTTP
    pub dispatcher: JobDispatcher,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Spawns a platform stub serving fixture shop data
    /// 2. Creates a temporary shop database
    /// 3. Wires up executor, locks, breakers and dispatcher with fast retries
    /// 4. Binds to a random port (127.0.0.1:0)
    /// 5. Spawns the server in a background task
    /// 6. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Stub or database creation fails
    /// - Port binding fails
    /// - Server fails to start
    /// - Server doesn't become ready within timeout
    pub async fn spawn() -> Self {
        Self::spawn_with(DispatcherConfig::default()).await
    }

    /// Spawns a test server with a custom dispatcher configuration
    ///
    /// Use this to test capacity limits or job timeouts.
    pub async fn spawn_with(dispatcher_config: DispatcherConfig) -> Self {
        metrics::init_metrics();

        // The fake merchant platform the server will pull shop data from
        let platform_stub = PlatformStub::spawn().await;

        let temp_db_dir = TempDir::new().expect("Failed to create temp db dir");
        let shop_store = Arc::new(
            SqliteShopStore::new(temp_db_dir.path().join("shops.db"))
                .expect("Failed to open shop store"),
        );
        let search_index = Arc::new(InMemorySearchIndex::new());
        let clock = Arc::new(SystemClock);

        let platform: Arc<dyn PlatformClient> = Arc::new(HttpPlatformClient::new(
            platform_stub.base_url.clone(),
            PLATFORM_TIMEOUT_SECS,
        ));

        // Short backoffs so retry paths settle within the test timeout
        let retry_policy = RetryPolicy {
            max_retries: 2,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
            backoff_multiplier: 2.0,
        };

        let executor = SyncExecutor::new(
            platform.clone(),
            search_index.clone() as Arc<dyn SearchIndex>,
            shop_store.clone() as Arc<dyn ShopStore>,
            retry_policy,
            3,
            clock.clone(),
        );
        let locks = Arc::new(LockManager::new(600, clock.clone()));
        let breakers = Arc::new(CircuitBreakerRegistry::new(5, 300, clock.clone()));
        let dispatcher = JobDispatcher::new(
            executor,
            shop_store.clone() as Arc<dyn ShopStore>,
            locks.clone(),
            breakers.clone(),
            dispatcher_config,
            clock.clone(),
        );
        let lifecycle = Arc::new(ShopLifecycle::new(
            platform,
            shop_store.clone() as Arc<dyn ShopStore>,
            dispatcher.clone(),
            "UTC".to_string(),
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                port,
            },
            start_time: Instant::now(),
            dispatcher: dispatcher.clone(),
            lifecycle,
            shop_store: shop_store.clone() as Arc<dyn ShopStore>,
            search_index: search_index.clone() as Arc<dyn SearchIndex>,
            locks,
            breakers,
            hash: "e2e-test".to_string(),
        };
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        // Wait for server to be ready
        let server = Self {
            base_url,
            port,
            platform: platform_stub,
            shop_store,
            search_index,
            dispatcher,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir cleans up the shop database automatically
    }
}
