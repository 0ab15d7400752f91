//! Shop lifecycle transitions.
//!
//! Connecting, reconnecting, deactivating and deleting shops all follow the
//! same shape: a fast, synchronous registry change, then a background job
//! submitted through the dispatcher to bring the search index in line. The
//! caller never waits for indexing.

use crate::jobs::{JobDispatcher, JobPriority, SyncJob, SyncJobType};
use crate::platform::{PlatformClient, PlatformCredentials, PlatformError};
use crate::shop_store::{ShopRecord, ShopStore};
use anyhow::anyhow;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("shop {0} is not registered")]
    ShopNotFound(String),
    #[error("shop {0} is already registered")]
    AlreadyExists(String),
    #[error("the platform rejected the shop credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Input for registering a shop.
#[derive(Debug, Clone)]
pub struct NewShop {
    pub domain: String,
    pub access_token: String,
    /// Display name override; when absent the platform profile name is used.
    pub name: Option<String>,
}

pub struct ShopLifecycle {
    platform: Arc<dyn PlatformClient>,
    shops: Arc<dyn ShopStore>,
    dispatcher: JobDispatcher,
    default_timezone: String,
}

impl ShopLifecycle {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        shops: Arc<dyn ShopStore>,
        dispatcher: JobDispatcher,
        default_timezone: String,
    ) -> Self {
        Self {
            platform,
            shops,
            dispatcher,
            default_timezone,
        }
    }

    /// Register a shop: validate its credentials, persist it, and start the
    /// first full sync in the background. The shop id is its platform domain.
    pub async fn create_shop(&self, new_shop: NewShop) -> Result<ShopRecord, LifecycleError> {
        let shop_id = new_shop.domain.trim().to_string();
        if shop_id.is_empty() {
            return Err(anyhow!("shop domain must not be empty").into());
        }

        if self.shops.get_shop(&shop_id)?.is_some() {
            return Err(LifecycleError::AlreadyExists(shop_id));
        }

        let credentials = PlatformCredentials {
            shop_domain: shop_id.clone(),
            access_token: new_shop.access_token.clone(),
        };
        self.validate_credentials(&credentials).await?;

        // Enrich from the profile where possible; validation already passed,
        // so a failed profile fetch falls back to defaults instead of
        // blocking registration
        let (name, timezone) = match self.platform.fetch_shop_profile(&credentials).await {
            Ok(profile) => (
                new_shop.name.unwrap_or(profile.name),
                profile
                    .timezone
                    .unwrap_or_else(|| self.default_timezone.clone()),
            ),
            Err(err) => {
                warn!("Could not fetch profile for shop {}: {}", shop_id, err);
                (
                    new_shop.name.unwrap_or_else(|| shop_id.clone()),
                    self.default_timezone.clone(),
                )
            }
        };

        let shop = ShopRecord::new(
            shop_id.clone(),
            name,
            shop_id.clone(),
            new_shop.access_token,
            timezone,
        );
        self.shops.insert_shop(&shop)?;
        info!("Registered shop {} ({})", shop.name, shop.id);

        self.dispatcher.submit_background(
            SyncJob::new(&shop.id, SyncJobType::FullSync)
                .with_priority(JobPriority::High)
                .with_triggered_by("lifecycle:create"),
        );

        Ok(shop)
    }

    /// Swap in a fresh access token after the merchant re-authorizes, mark
    /// the shop active, and schedule a cleanup resync so documents indexed
    /// under the old connection get flushed.
    pub async fn reconnect_shop(
        &self,
        shop_id: &str,
        access_token: &str,
    ) -> Result<ShopRecord, LifecycleError> {
        let shop = self.require_shop(shop_id)?;

        let credentials = PlatformCredentials {
            shop_domain: shop.domain.clone(),
            access_token: access_token.to_string(),
        };
        self.validate_credentials(&credentials).await?;

        self.shops.update_access_token(shop_id, access_token)?;
        self.shops.set_shop_active(shop_id, true)?;
        info!("Shop {} reconnected with fresh credentials", shop_id);

        self.dispatcher.submit_background(
            SyncJob::new(shop_id, SyncJobType::CleanupResync)
                .with_priority(JobPriority::High)
                .with_triggered_by("lifecycle:reconnect"),
        );

        self.require_shop(shop_id)
    }

    /// Remove the shop from the registry and tear its index down in the
    /// background. The teardown needs no credentials, so it works even when
    /// the merchant already revoked the token.
    pub fn delete_shop(&self, shop_id: &str) -> Result<(), LifecycleError> {
        self.require_shop(shop_id)?;
        self.shops.delete_shop(shop_id)?;
        info!("Deleted shop {}", shop_id);

        self.dispatcher.submit_background(
            SyncJob::new(shop_id, SyncJobType::IndexTeardown)
                .with_priority(JobPriority::High)
                .with_triggered_by("lifecycle:delete"),
        );

        Ok(())
    }

    /// Keep the shop registered but stop serving its data: flag it inactive
    /// and tear the index down. Idempotent.
    pub fn deactivate_shop(&self, shop_id: &str) -> Result<ShopRecord, LifecycleError> {
        self.require_shop(shop_id)?;
        self.shops.set_shop_active(shop_id, false)?;
        info!("Deactivated shop {}", shop_id);

        self.dispatcher.submit_background(
            SyncJob::new(shop_id, SyncJobType::IndexTeardown)
                .with_triggered_by("lifecycle:deactivate"),
        );

        self.require_shop(shop_id)
    }

    /// Bring a deactivated shop back: flag it active and rebuild the index
    /// from scratch. Idempotent.
    pub fn reactivate_shop(&self, shop_id: &str) -> Result<ShopRecord, LifecycleError> {
        self.require_shop(shop_id)?;
        self.shops.set_shop_active(shop_id, true)?;
        info!("Reactivated shop {}", shop_id);

        self.dispatcher.submit_background(
            SyncJob::new(shop_id, SyncJobType::FullSync)
                .with_priority(JobPriority::High)
                .with_triggered_by("lifecycle:reactivate"),
        );

        self.require_shop(shop_id)
    }

    async fn validate_credentials(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<(), LifecycleError> {
        match self.platform.validate_credentials(credentials).await {
            Ok(()) => Ok(()),
            Err(PlatformError::AuthInvalid) => Err(LifecycleError::InvalidCredentials),
            Err(err) => Err(LifecycleError::Internal(anyhow!(
                "could not reach the platform to validate credentials: {err}"
            ))),
        }
    }

    fn require_shop(&self, shop_id: &str) -> Result<ShopRecord, LifecycleError> {
        self.shops
            .get_shop(shop_id)?
            .ok_or_else(|| LifecycleError::ShopNotFound(shop_id.to_string()))
    }
}
