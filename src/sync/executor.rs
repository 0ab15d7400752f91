use super::models::{PartitionOutcome, SyncError, SyncOptions, SyncOutcome, SyncStepError};
use super::retry_policy::RetryPolicy;
use super::transform;
use crate::clock::Clock;
use crate::platform::{PlatformClient, PlatformCredentials};
use crate::search_index::{IndexError, Partition, SearchIndex};
use crate::server::metrics;
use crate::shop_store::ShopStore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long to wait before re-probing a partition the index reported missing.
/// Index writes can become visible slightly after the write call returns.
const CONSISTENCY_REPROBE_DELAY: Duration = Duration::from_millis(250);

/// Runs sync passes for one shop at a time.
///
/// A pass validates credentials, mirrors the requested partitions with
/// bounded concurrency and inline retries, then verifies that every
/// partition exists in the index, creating any that are missing. The shop's
/// `last_sync_at` is only stamped when that final check passes.
pub struct SyncExecutor {
    platform: Arc<dyn PlatformClient>,
    index: Arc<dyn SearchIndex>,
    shops: Arc<dyn ShopStore>,
    retry_policy: RetryPolicy,
    partition_concurrency: usize,
    clock: Arc<dyn Clock>,
}

impl SyncExecutor {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        index: Arc<dyn SearchIndex>,
        shops: Arc<dyn ShopStore>,
        retry_policy: RetryPolicy,
        partition_concurrency: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            platform,
            index,
            shops,
            retry_policy,
            partition_concurrency,
            clock,
        }
    }

    /// Run one sync pass. Partition failures are recorded in the outcome
    /// rather than propagated; only failures that invalidate the whole pass
    /// (bad credentials, an unregistered shop) surface as `Err`.
    pub async fn execute(
        &self,
        shop_id: &str,
        credentials: &PlatformCredentials,
        options: &SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let mut operations = Vec::new();
        let mut errors = Vec::new();

        operations.push("validate-credentials".to_string());
        self.platform
            .validate_credentials(credentials)
            .await
            .map_err(SyncError::from)?;

        if options.teardown_first {
            for partition in Partition::ALL {
                match self.index.delete_partition(shop_id, partition).await {
                    Ok(()) => operations.push(format!("teardown:{partition}")),
                    Err(err) => errors.push(format!("teardown of {partition} failed: {err}")),
                }
            }
        }

        let retry_policy = self.retry_policy.capped(options.max_retries);
        let mut outcomes: Vec<PartitionOutcome> =
            stream::iter(options.partitions.iter().copied())
                .map(|partition| self.sync_partition(shop_id, credentials, partition, &retry_policy))
                .buffer_unordered(self.partition_concurrency.max(1))
                .collect()
                .await;
        outcomes.sort_by_key(|outcome| outcome.partition);

        for outcome in &outcomes {
            metrics::record_partition_sync(outcome.partition.as_str(), outcome.success);
            match &outcome.error {
                None => operations.push(format!(
                    "partition:{}:ok:{}",
                    outcome.partition, outcome.documents
                )),
                Some(error) => {
                    operations.push(format!("partition:{}:failed", outcome.partition));
                    errors.push(format!("{}: {}", outcome.partition, error));
                }
            }
        }

        let consistency_ok = if options.consistency_check {
            let ok = self
                .verify_and_repair(shop_id, &mut operations, &mut errors)
                .await;
            operations.push(
                if ok {
                    "consistency-check:passed"
                } else {
                    "consistency-check:failed"
                }
                .to_string(),
            );
            ok
        } else {
            true
        };

        if consistency_ok {
            match self.shops.update_last_sync_at(shop_id, self.clock.now()) {
                Ok(()) => operations.push("last-sync-stamped".to_string()),
                Err(err) => {
                    warn!("Failed to stamp last_sync_at for shop {}: {:#}", shop_id, err);
                    errors.push(format!("failed to record last sync time: {err:#}"));
                }
            }
        }

        let documents_indexed = outcomes.iter().map(|o| o.documents).sum();
        let partitions_succeeded = outcomes.iter().filter(|o| o.success).count();
        metrics::record_documents_indexed(documents_indexed);

        Ok(SyncOutcome {
            partitions_attempted: outcomes.len(),
            partitions_succeeded,
            documents_indexed,
            partition_outcomes: outcomes,
            errors,
            operations,
            consistency_ok,
        })
    }

    /// Drop every partition the shop owns. Used when a shop is deleted or
    /// deactivated; does not touch `last_sync_at`.
    pub async fn teardown_index(&self, shop_id: &str) -> Result<SyncOutcome, SyncError> {
        let mut operations = Vec::new();
        let mut errors = Vec::new();
        let mut deleted = 0;

        for partition in Partition::ALL {
            match self.index.delete_partition(shop_id, partition).await {
                Ok(()) => {
                    deleted += 1;
                    operations.push(format!("teardown:{partition}"));
                }
                Err(err) => errors.push(format!("teardown of {partition} failed: {err}")),
            }
        }

        info!("Tore down {} partitions for shop {}", deleted, shop_id);

        let consistency_ok = errors.is_empty();
        Ok(SyncOutcome {
            partitions_attempted: Partition::ALL.len(),
            partitions_succeeded: deleted,
            documents_indexed: 0,
            partition_outcomes: Vec::new(),
            errors,
            operations,
            consistency_ok,
        })
    }

    /// Read-only verification pass: credentials still work and every
    /// partition exists. Never repairs anything.
    pub async fn health_check(
        &self,
        shop_id: &str,
        credentials: &PlatformCredentials,
    ) -> Result<SyncOutcome, SyncError> {
        let mut operations = Vec::new();
        let mut errors = Vec::new();

        operations.push("validate-credentials".to_string());
        self.platform
            .validate_credentials(credentials)
            .await
            .map_err(SyncError::from)?;

        let mut present = 0;
        for partition in Partition::ALL {
            operations.push(format!("verify-partition:{partition}"));
            match self.index.partition_exists(shop_id, partition).await {
                Ok(true) => present += 1,
                Ok(false) => errors.push(SyncError::PartitionMissing { partition }.to_string()),
                Err(err) => errors.push(format!("probe for {partition} failed: {err}")),
            }
        }

        let consistency_ok = errors.is_empty();
        Ok(SyncOutcome {
            partitions_attempted: Partition::ALL.len(),
            partitions_succeeded: present,
            documents_indexed: 0,
            partition_outcomes: Vec::new(),
            errors,
            operations,
            consistency_ok,
        })
    }

    async fn sync_partition(
        &self,
        shop_id: &str,
        credentials: &PlatformCredentials,
        partition: Partition,
        retry_policy: &RetryPolicy,
    ) -> PartitionOutcome {
        let mut retry_count: u32 = 0;
        loop {
            match self.attempt_partition(shop_id, credentials, partition).await {
                Ok(documents) => {
                    debug!(
                        "Partition {} for shop {} synced {} documents",
                        partition, shop_id, documents
                    );
                    return PartitionOutcome {
                        partition,
                        success: true,
                        documents,
                        error: None,
                    };
                }
                Err(error) => {
                    if retry_policy.should_retry(&error, retry_count) {
                        let backoff = retry_policy.backoff(retry_count);
                        retry_count += 1;
                        warn!(
                            "Partition {} for shop {} failed ({}), retry {} in {:?}",
                            partition, shop_id, error.message, retry_count, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    warn!(
                        "Partition {} for shop {} failed permanently: {}",
                        partition, shop_id, error.message
                    );
                    return PartitionOutcome {
                        partition,
                        success: false,
                        documents: 0,
                        error: Some(error.message),
                    };
                }
            }
        }
    }

    async fn attempt_partition(
        &self,
        shop_id: &str,
        credentials: &PlatformCredentials,
        partition: Partition,
    ) -> Result<usize, SyncStepError> {
        let documents = match partition {
            Partition::ShopProfile => {
                let profile = self.platform.fetch_shop_profile(credentials).await?;
                transform::shop_profile_documents(&profile)
            }
            Partition::Catalog => {
                let items = self.platform.fetch_catalog(credentials).await?;
                transform::catalog_documents(&items)
            }
            Partition::Orders => {
                let orders = self.platform.fetch_orders(credentials).await?;
                transform::order_documents(&orders)
            }
            Partition::Customers => {
                let customers = self.platform.fetch_customers(credentials).await?;
                transform::customer_documents(&customers)
            }
            Partition::Aggregates => {
                // Rollups are computed from the raw orders feed; the platform
                // has no aggregate endpoint
                let orders = self.platform.fetch_orders(credentials).await?;
                transform::aggregate_documents(&orders)
            }
            Partition::DialogueHistory => {
                // Conversations are written by the dashboard, not mirrored
                Vec::new()
            }
        };

        if documents.is_empty() {
            self.index.ensure_partition(shop_id, partition).await?;
            Ok(0)
        } else {
            Ok(self
                .index
                .upsert_documents(shop_id, partition, &documents)
                .await?)
        }
    }

    async fn verify_and_repair(
        &self,
        shop_id: &str,
        operations: &mut Vec<String>,
        errors: &mut Vec<String>,
    ) -> bool {
        let mut all_present = true;
        for partition in Partition::ALL {
            match self.probe_partition(shop_id, partition).await {
                Ok(true) => {}
                Ok(false) => match self.index.ensure_partition(shop_id, partition).await {
                    Ok(()) => {
                        info!("Repaired missing partition {} for shop {}", partition, shop_id);
                        operations.push(format!("repair-partition:{partition}"));
                    }
                    Err(err) => {
                        errors.push(format!(
                            "partition {partition} is missing and repair failed: {err}"
                        ));
                        all_present = false;
                    }
                },
                Err(err) => {
                    errors.push(format!("consistency probe for {partition} failed: {err}"));
                    all_present = false;
                }
            }
        }
        all_present
    }

    async fn probe_partition(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<bool, IndexError> {
        if self.index.partition_exists(shop_id, partition).await? {
            return Ok(true);
        }
        tokio::time::sleep(CONSISTENCY_REPROBE_DELAY).await;
        self.index.partition_exists(shop_id, partition).await
    }
}
