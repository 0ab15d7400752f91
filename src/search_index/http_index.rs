//! HTTP client for an external index service.

use super::models::{IndexDocument, IndexError, Partition, PartitionStats};
use super::SearchIndex;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct HttpSearchIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UpsertResponse {
    upserted: usize,
}

impl HttpSearchIndex {
    pub fn new(base_url: String, timeout_sec: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        let base_url = base_url.trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    fn partition_url(&self, shop_id: &str, partition: Partition) -> String {
        format!(
            "{}/indexes/{}/partitions/{}",
            self.base_url, shop_id, partition
        )
    }

    fn classify(status: reqwest::StatusCode, message: String) -> IndexError {
        if status.as_u16() == 429 || status.is_server_error() {
            IndexError::Unavailable(format!("status {status}: {message}"))
        } else {
            IndexError::Rejected(format!("status {status}: {message}"))
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn ensure_partition(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<(), IndexError> {
        let response = self
            .client
            .put(self.partition_url(shop_id, partition))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::classify(status, message))
        }
    }

    async fn upsert_documents(
        &self,
        shop_id: &str,
        partition: Partition,
        documents: &[IndexDocument],
    ) -> Result<usize, IndexError> {
        let url = format!("{}/documents", self.partition_url(shop_id, partition));
        let response = self.client.post(url).json(documents).send().await?;

        let status = response.status();
        if status.is_success() {
            let body: UpsertResponse = response
                .json()
                .await
                .map_err(|e| IndexError::Unavailable(format!("invalid response body: {e}")))?;
            Ok(body.upserted)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::classify(status, message))
        }
    }

    async fn partition_exists(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<bool, IndexError> {
        let response = self
            .client
            .get(self.partition_url(shop_id, partition))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.as_u16() == 404 {
            Ok(false)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::classify(status, message))
        }
    }

    async fn partition_stats(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<PartitionStats, IndexError> {
        let url = format!("{}/stats", self.partition_url(shop_id, partition));
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| IndexError::Unavailable(format!("invalid response body: {e}")))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::classify(status, message))
        }
    }

    async fn delete_partition(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<(), IndexError> {
        let response = self
            .client
            .delete(self.partition_url(shop_id, partition))
            .send()
            .await?;

        let status = response.status();
        // Deleting what is already gone counts as success
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::classify(status, message))
        }
    }
}
