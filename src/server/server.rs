//! HTTP server assembly.

use anyhow::Result;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::http_layers::log_requests;
use super::metrics::metrics_handler;
use super::shop_routes::shop_routes;
use super::state::ServerState;
use super::sync_routes::sync_routes;

#[derive(Debug, Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub running_jobs: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        running_jobs: state.dispatcher.running_count(),
    };
    Json(stats)
}

pub fn make_app(state: ServerState) -> Router {
    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics_handler))
        .nest("/v1/sync", sync_routes())
        .nest("/v1/shops", shop_routes())
        .with_state(state.clone());

    app = app.layer(middleware::from_fn_with_state(state, log_requests));

    app
}

pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Serving on 127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
