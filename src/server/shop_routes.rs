//! Shop registry and lifecycle routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use super::state::ServerState;
use super::views::{BreakerView, JobResultView, RunningJobView, ShopView, SyncRunView};
use crate::lifecycle::{LifecycleError, NewShop};
use crate::search_index::Partition;

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateShopBody {
    domain: String,
    access_token: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReconnectBody {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ListShopsQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Deserialize)]
struct SyncRunsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ShopStatusResponse {
    shop: ShopView,
    lock_held: bool,
    lock_holder_id: Option<String>,
    lock_reason: Option<String>,
    circuit: Option<BreakerView>,
    running_job: Option<RunningJobView>,
    last_job: Option<JobResultView>,
    /// Document count per index partition; a missing key means the partition
    /// does not exist or the index could not be reached.
    partitions: BTreeMap<String, usize>,
}

fn lifecycle_error_response(err: LifecycleError) -> Response {
    let status = match &err {
        LifecycleError::ShopNotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::AlreadyExists(_) => StatusCode::CONFLICT,
        LifecycleError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LifecycleError::Internal(inner) => {
            error!("Lifecycle operation failed: {:#}", inner);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// POST / - Register a shop and start its first full sync
async fn create_shop(
    State(state): State<ServerState>,
    Json(body): Json<CreateShopBody>,
) -> impl IntoResponse {
    let new_shop = NewShop {
        domain: body.domain,
        access_token: body.access_token,
        name: body.name,
    };

    match state.lifecycle.create_shop(new_shop).await {
        Ok(shop) => (StatusCode::CREATED, Json(ShopView::from(&shop))).into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

/// GET / - List registered shops
async fn list_shops(
    State(state): State<ServerState>,
    Query(query): Query<ListShopsQuery>,
) -> impl IntoResponse {
    match state.shop_store.list_shops(!query.include_inactive) {
        Ok(shops) => {
            let views: Vec<ShopView> = shops.iter().map(ShopView::from).collect();
            Json(views).into_response()
        }
        Err(err) => {
            error!("Shop listing failed: {:#}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Shop listing failed").into_response()
        }
    }
}

/// GET /{shop_id} - Fetch one shop
async fn get_shop(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> impl IntoResponse {
    match state.shop_store.get_shop(&shop_id) {
        Ok(Some(shop)) => Json(ShopView::from(&shop)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("Shop {} is not registered", shop_id),
        )
            .into_response(),
        Err(err) => {
            error!("Shop lookup failed for {}: {:#}", shop_id, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Shop lookup failed").into_response()
        }
    }
}

/// GET /{shop_id}/status - Shop sync posture for the dashboard
async fn get_shop_status(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> impl IntoResponse {
    let shop = match state.shop_store.get_shop(&shop_id) {
        Ok(Some(shop)) => shop,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                format!("Shop {} is not registered", shop_id),
            )
                .into_response();
        }
        Err(err) => {
            error!("Shop lookup failed for {}: {:#}", shop_id, err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Shop lookup failed").into_response();
        }
    };

    let lock = state.locks.holder_for(&shop_id);
    let circuit = state.breakers.snapshot(&shop_id);
    let running_job = state.dispatcher.running_job_for_shop(&shop_id);
    let last_job = state.dispatcher.last_result_for_shop(&shop_id);

    let mut partitions = BTreeMap::new();
    for partition in Partition::ALL {
        if let Ok(stats) = state.search_index.partition_stats(&shop_id, partition).await {
            partitions.insert(partition.as_str().to_string(), stats.document_count);
        }
    }

    Json(ShopStatusResponse {
        shop: ShopView::from(&shop),
        lock_held: lock.is_some(),
        lock_holder_id: lock.as_ref().map(|l| l.holder_id.clone()),
        lock_reason: lock.map(|l| l.reason),
        circuit: circuit.as_ref().map(BreakerView::from),
        running_job: running_job.as_ref().map(RunningJobView::from),
        last_job: last_job.as_ref().map(JobResultView::from),
        partitions,
    })
    .into_response()
}

/// GET /{shop_id}/sync-runs - Persisted run history, newest first
async fn get_sync_runs(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
    Query(query): Query<SyncRunsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(500);
    match state.shop_store.get_runs_for_shop(&shop_id, limit) {
        Ok(runs) => {
            let views: Vec<SyncRunView> = runs.iter().map(SyncRunView::from).collect();
            Json(views).into_response()
        }
        Err(err) => {
            error!("Run history lookup failed for {}: {:#}", shop_id, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Run history lookup failed").into_response()
        }
    }
}

/// POST /{shop_id}/reconnect - Swap credentials and resync
async fn reconnect_shop(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
    Json(body): Json<ReconnectBody>,
) -> impl IntoResponse {
    match state
        .lifecycle
        .reconnect_shop(&shop_id, &body.access_token)
        .await
    {
        Ok(shop) => Json(ShopView::from(&shop)).into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

/// POST /{shop_id}/deactivate - Pause a shop and tear its index down
async fn deactivate_shop(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> impl IntoResponse {
    match state.lifecycle.deactivate_shop(&shop_id) {
        Ok(shop) => Json(ShopView::from(&shop)).into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

/// POST /{shop_id}/reactivate - Resume a shop and rebuild its index
async fn reactivate_shop(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> impl IntoResponse {
    match state.lifecycle.reactivate_shop(&shop_id) {
        Ok(shop) => Json(ShopView::from(&shop)).into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

/// DELETE /{shop_id} - Remove a shop and tear its index down
async fn delete_shop(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> impl IntoResponse {
    match state.lifecycle.delete_shop(&shop_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the shop registry routes.
///
/// - POST /
/// - GET /
/// - GET /{shop_id}
/// - GET /{shop_id}/status
/// - GET /{shop_id}/sync-runs
/// - POST /{shop_id}/reconnect
/// - POST /{shop_id}/deactivate
/// - POST /{shop_id}/reactivate
/// - DELETE /{shop_id}
pub fn shop_routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(create_shop).get(list_shops))
        .route("/{shop_id}", get(get_shop).delete(delete_shop))
        .route("/{shop_id}/status", get(get_shop_status))
        .route("/{shop_id}/sync-runs", get(get_sync_runs))
        .route("/{shop_id}/reconnect", post(reconnect_shop))
        .route("/{shop_id}/deactivate", post(deactivate_shop))
        .route("/{shop_id}/reactivate", post(reactivate_shop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::jobs::{CircuitBreakerRegistry, DispatcherConfig, JobDispatcher, LockManager};
    use crate::lifecycle::ShopLifecycle;
    use crate::platform::{
        CatalogItem, Customer, Order, PlatformClient, PlatformCredentials, PlatformError,
        ShopProfile,
    };
    use crate::search_index::InMemorySearchIndex;
    use crate::server::ServerConfig;
    use crate::shop_store::{ShopStore, SqliteShopStore};
    use crate::sync::{RetryPolicy, SyncExecutor};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const GOOD_TOKEN: &str = "shpat_good";

    /// Platform stub that accepts only [`GOOD_TOKEN`] and serves empty feeds.
    struct StubPlatform;

    #[async_trait]
    impl PlatformClient for StubPlatform {
        async fn validate_credentials(
            &self,
            credentials: &PlatformCredentials,
        ) -> Result<(), PlatformError> {
            if credentials.access_token == GOOD_TOKEN {
                Ok(())
            } else {
                Err(PlatformError::AuthInvalid)
            }
        }

        async fn fetch_shop_profile(
            &self,
            credentials: &PlatformCredentials,
        ) -> Result<ShopProfile, PlatformError> {
            Ok(ShopProfile {
                id: "s-1".to_string(),
                name: "Acme Shop".to_string(),
                domain: credentials.shop_domain.clone(),
                email: None,
                currency: "EUR".to_string(),
                timezone: Some("Europe/Rome".to_string()),
                plan: None,
            })
        }

        async fn fetch_catalog(
            &self,
            _credentials: &PlatformCredentials,
        ) -> Result<Vec<CatalogItem>, PlatformError> {
            Ok(Vec::new())
        }

        async fn fetch_orders(
            &self,
            _credentials: &PlatformCredentials,
        ) -> Result<Vec<Order>, PlatformError> {
            Ok(Vec::new())
        }

        async fn fetch_customers(
            &self,
            _credentials: &PlatformCredentials,
        ) -> Result<Vec<Customer>, PlatformError> {
            Ok(Vec::new())
        }
    }

    struct TestRig {
        app: Router,
        state: ServerState,
        _dir: TempDir,
    }

    fn create_rig() -> TestRig {
        let dir = TempDir::new().unwrap();
        let shops = Arc::new(SqliteShopStore::new(dir.path().join("shops.db")).unwrap());
        let clock = Arc::new(MockClock::default());
        let platform = Arc::new(StubPlatform);
        let index = Arc::new(InMemorySearchIndex::new());
        let policy = RetryPolicy {
            max_retries: 0,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            backoff_multiplier: 1.0,
        };
        let executor = SyncExecutor::new(
            platform.clone(),
            index.clone(),
            shops.clone(),
            policy,
            3,
            clock.clone(),
        );
        let locks = Arc::new(LockManager::new(600, clock.clone()));
        let breakers = Arc::new(CircuitBreakerRegistry::new(5, 300, clock.clone()));
        let dispatcher = JobDispatcher::new(
            executor,
            shops.clone(),
            locks.clone(),
            breakers.clone(),
            DispatcherConfig::default(),
            clock.clone(),
        );
        let lifecycle = Arc::new(ShopLifecycle::new(
            platform,
            shops.clone(),
            dispatcher.clone(),
            "UTC".to_string(),
        ));
        let state = ServerState {
            config: ServerConfig::default(),
            start_time: Instant::now(),
            dispatcher,
            lifecycle,
            shop_store: shops,
            search_index: index,
            locks,
            breakers,
            hash: "test".to_string(),
        };
        TestRig {
            app: shop_routes().with_state(state.clone()),
            state,
            _dir: dir,
        }
    }

    async fn request(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        (status, json)
    }

    async fn await_shop_settled(rig: &TestRig, shop_id: &str) {
        for _ in 0..400 {
            if rig.state.dispatcher.last_result_for_shop(shop_id).is_some()
                && rig.state.dispatcher.running_job_for_shop(shop_id).is_none()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no job settled for {shop_id}");
    }

    #[tokio::test]
    async fn creating_a_shop_returns_the_registered_view() {
        let rig = create_rig();

        let (status, json) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["id"], "acme.example.com");
        assert_eq!(json["name"], "Acme Shop");
        assert_eq!(json["timezone"], "Europe/Rome");
        assert_eq!(json["is_active"], true);
        assert!(json.get("access_token").is_none());
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let rig = create_rig();

        let (status, _) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": "shpat_wrong"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) = request(&rig.app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let rig = create_rig();
        let body = json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN});

        let (status, _) = request(&rig.app, "POST", "/", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = request(&rig.app, "POST", "/", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn listing_filters_inactive_shops_unless_asked() {
        let rig = create_rig();
        for domain in ["acme.example.com", "beta.example.com"] {
            let (status, _) = request(
                &rig.app,
                "POST",
                "/",
                Some(json!({"domain": domain, "access_token": GOOD_TOKEN})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, _) = request(&rig.app, "POST", "/beta.example.com/deactivate", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = request(&rig.app, "GET", "/", None).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (_, json) = request(&rig.app, "GET", "/?include_inactive=true", None).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn status_reports_index_partitions_after_first_sync() {
        let rig = create_rig();
        let (status, _) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        await_shop_settled(&rig, "acme.example.com").await;

        let (status, json) = request(&rig.app, "GET", "/acme.example.com/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["shop"]["id"], "acme.example.com");
        assert_eq!(json["lock_held"], false);
        assert_eq!(json["last_job"]["success"], true);
        let partitions = json["partitions"].as_object().unwrap();
        assert_eq!(partitions.len(), Partition::ALL.len());
        assert_eq!(partitions["orders"], 0);
    }

    #[tokio::test]
    async fn status_surfaces_a_held_lock() {
        let rig = create_rig();
        let (status, _) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        await_shop_settled(&rig, "acme.example.com").await;

        let holder = rig.state.locks.acquire("acme.example.com", "manual").unwrap();
        let (_, json) = request(&rig.app, "GET", "/acme.example.com/status", None).await;

        assert_eq!(json["lock_held"], true);
        assert_eq!(json["lock_holder_id"], holder.as_str());
        assert_eq!(json["lock_reason"], "manual");
    }

    #[tokio::test]
    async fn sync_runs_lists_persisted_history() {
        let rig = create_rig();
        let (status, _) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        await_shop_settled(&rig, "acme.example.com").await;

        let (status, json) = request(&rig.app, "GET", "/acme.example.com/sync-runs", None).await;

        assert_eq!(status, StatusCode::OK);
        let runs = json.as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["job_type"], "FULL_SYNC");
        assert_eq!(runs[0]["status"], "completed");
        assert_eq!(runs[0]["triggered_by"], "lifecycle:create");
    }

    #[tokio::test]
    async fn reconnect_rejects_bad_token_and_accepts_good_one() {
        let rig = create_rig();
        let (status, _) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        await_shop_settled(&rig, "acme.example.com").await;

        let (status, _) = request(
            &rig.app,
            "POST",
            "/acme.example.com/reconnect",
            Some(json!({"access_token": "shpat_wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) = request(
            &rig.app,
            "POST",
            "/acme.example.com/reconnect",
            Some(json!({"access_token": GOOD_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], "acme.example.com");
    }

    #[tokio::test]
    async fn deleting_a_shop_removes_it_from_the_registry() {
        let rig = create_rig();
        let (status, _) = request(
            &rig.app,
            "POST",
            "/",
            Some(json!({"domain": "acme.example.com", "access_token": GOOD_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        await_shop_settled(&rig, "acme.example.com").await;

        let (status, _) = request(&rig.app, "DELETE", "/acme.example.com", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = request(&rig.app, "GET", "/acme.example.com", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(rig
            .state
            .shop_store
            .get_shop("acme.example.com")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn lifecycle_routes_on_unknown_shop_are_not_found() {
        let rig = create_rig();

        for (method, uri) in [
            ("POST", "/ghost.example.com/deactivate"),
            ("POST", "/ghost.example.com/reactivate"),
            ("DELETE", "/ghost.example.com"),
            ("GET", "/ghost.example.com/status"),
        ] {
            let (status, _) = request(&rig.app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }
}
