//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all sync-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client for the sync server API
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Shop Endpoints
    // ========================================================================

    /// POST /v1/shops
    pub async fn create_shop(&self, domain: &str, access_token: &str) -> Response {
        self.client
            .post(format!("{}/v1/shops", self.base_url))
            .json(&json!({
                "domain": domain,
                "access_token": access_token,
            }))
            .send()
            .await
            .expect("Create shop request failed")
    }

    /// GET /v1/shops
    pub async fn list_shops(&self) -> Response {
        self.client
            .get(format!("{}/v1/shops", self.base_url))
            .send()
            .await
            .expect("List shops request failed")
    }

    /// GET /v1/shops?include_inactive=true
    pub async fn list_shops_with_inactive(&self) -> Response {
        self.client
            .get(format!("{}/v1/shops?include_inactive=true", self.base_url))
            .send()
            .await
            .expect("List shops request failed")
    }

    /// GET /v1/shops/{shop_id}
    pub async fn get_shop(&self, shop_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/shops/{}", self.base_url, shop_id))
            .send()
            .await
            .expect("Get shop request failed")
    }

    /// GET /v1/shops/{shop_id}/status
    pub async fn get_shop_status(&self, shop_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/shops/{}/status", self.base_url, shop_id))
            .send()
            .await
            .expect("Get shop status request failed")
    }

    /// GET /v1/shops/{shop_id}/sync-runs
    pub async fn get_sync_runs(&self, shop_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/shops/{}/sync-runs", self.base_url, shop_id))
            .send()
            .await
            .expect("Get sync runs request failed")
    }

    /// POST /v1/shops/{shop_id}/reconnect
    pub async fn reconnect_shop(&self, shop_id: &str, access_token: &str) -> Response {
        self.client
            .post(format!("{}/v1/shops/{}/reconnect", self.base_url, shop_id))
            .json(&json!({ "access_token": access_token }))
            .send()
            .await
            .expect("Reconnect shop request failed")
    }

    /// POST /v1/shops/{shop_id}/deactivate
    pub async fn deactivate_shop(&self, shop_id: &str) -> Response {
        self.client
            .post(format!("{}/v1/shops/{}/deactivate", self.base_url, shop_id))
            .send()
            .await
            .expect("Deactivate shop request failed")
    }

    /// POST /v1/shops/{shop_id}/reactivate
    pub async fn reactivate_shop(&self, shop_id: &str) -> Response {
        self.client
            .post(format!("{}/v1/shops/{}/reactivate", self.base_url, shop_id))
            .send()
            .await
            .expect("Reactivate shop request failed")
    }

    /// DELETE /v1/shops/{shop_id}
    pub async fn delete_shop(&self, shop_id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/shops/{}", self.base_url, shop_id))
            .send()
            .await
            .expect("Delete shop request failed")
    }

    // ========================================================================
    // Sync Job Endpoints
    // ========================================================================

    /// POST /v1/sync/jobs
    pub async fn submit_job(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/v1/sync/jobs", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Submit job request failed")
    }

    /// GET /v1/sync/jobs/{job_id}
    pub async fn get_job(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/sync/jobs/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Get job request failed")
    }

    /// GET /v1/sync/status
    pub async fn sync_status(&self) -> Response {
        self.client
            .get(format!("{}/v1/sync/status", self.base_url))
            .send()
            .await
            .expect("Sync status request failed")
    }

    // ========================================================================
    // Server Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /metrics
    pub async fn metrics(&self) -> Response {
        self.client
            .get(format!("{}/metrics", self.base_url))
            .send()
            .await
            .expect("Metrics request failed")
    }

    // ========================================================================
    // Settle Helpers
    // ========================================================================

    /// Polls a job until it leaves the running state, returning the final
    /// job status body.
    ///
    /// # Panics
    ///
    /// Panics if the job does not settle within `JOB_SETTLE_TIMEOUT_MS`.
    pub async fn await_job(&self, job_id: &str) -> Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(JOB_SETTLE_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!("Job {} did not settle within {}ms", job_id, JOB_SETTLE_TIMEOUT_MS);
            }

            let response = self.get_job(job_id).await;
            if response.status().is_success() {
                let body: Value = response.json().await.expect("Job status was not JSON");
                if body["status"] != "running" {
                    return body;
                }
            }

            tokio::time::sleep(Duration::from_millis(JOB_SETTLE_POLL_INTERVAL_MS)).await;
        }
    }

    /// Polls a shop's status until a job of the given type has settled and
    /// nothing is running, returning the final shop status body.
    ///
    /// Background jobs kicked off by lifecycle changes are submitted after
    /// the HTTP response, so this also rides out the gap before admission.
    ///
    /// # Panics
    ///
    /// Panics if no such job settles within `JOB_SETTLE_TIMEOUT_MS`.
    pub async fn await_shop_job(&self, shop_id: &str, job_type: &str) -> Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(JOB_SETTLE_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Shop {} saw no settled {} job within {}ms",
                    shop_id, job_type, JOB_SETTLE_TIMEOUT_MS
                );
            }

            let response = self.get_shop_status(shop_id).await;
            if response.status().is_success() {
                let body: Value = response.json().await.expect("Shop status was not JSON");
                if body["running_job"].is_null() && body["last_job"]["job_type"] == job_type {
                    return body;
                }
            }

            tokio::time::sleep(Duration::from_millis(JOB_SETTLE_POLL_INTERVAL_MS)).await;
        }
    }
}
