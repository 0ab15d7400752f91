//! Periodic upkeep tasks that run next to the HTTP server.
//!
//! Both loops are spawned from main and wind down when the shutdown token
//! fires. Ticks are skipped while a previous pass is still running.

use crate::clock::Clock;
use crate::jobs::{JobDispatcher, JobPriority, SyncJob, SyncJobType};
use crate::shop_store::ShopStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Delete settled sync run rows older than the retention window.
pub async fn run_sync_run_pruner(
    shops: Arc<dyn ShopStore>,
    clock: Arc<dyn Clock>,
    retention_days: u64,
    interval_hours: u64,
    shutdown: CancellationToken,
) {
    let interval = Duration::from_secs(interval_hours * 60 * 60);
    let mut ticker = tokio::time::interval(interval);

    // Skip the first immediate tick, wait for the first interval
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.cancelled() => {
                info!("Run pruner received shutdown signal");
                return;
            }
        }

        let cutoff = clock.now() - chrono::Duration::days(retention_days as i64);
        match shops.prune_runs_older_than(cutoff) {
            Ok(count) => {
                if count > 0 {
                    info!("Pruned {} old sync runs", count);
                }
            }
            Err(e) => {
                error!("Failed to prune sync runs: {}", e);
            }
        }
    }
}

/// Queue a low priority health check for every active shop at each tick.
///
/// Health checks go through the dispatcher like any other job, so a shop
/// that is locked or circuit-open is skipped by the normal admission rules.
pub async fn run_health_sweep(
    shops: Arc<dyn ShopStore>,
    dispatcher: JobDispatcher,
    interval_secs: u64,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.cancelled() => {
                info!("Health sweep received shutdown signal");
                return;
            }
        }

        let active_shops = match shops.list_shops(true) {
            Ok(list) => list,
            Err(e) => {
                error!("Health sweep could not list shops: {}", e);
                continue;
            }
        };

        info!("Health sweep over {} active shops", active_shops.len());
        for shop in active_shops {
            dispatcher.submit_background(
                SyncJob::new(&shop.id, SyncJobType::HealthCheck)
                    .with_priority(JobPriority::Low)
                    .with_triggered_by("maintenance:health-sweep"),
            );
        }
    }
}
