mod http_client;
mod models;

pub use http_client::HttpPlatformClient;
pub use models::{
    CatalogItem, Customer, LineItem, Order, PlatformCredentials, PlatformError, ShopProfile,
};

use async_trait::async_trait;

/// Read access to the merchant platform's admin API.
///
/// Every call authenticates with per-shop credentials; the platform is the
/// source of truth for everything the index mirrors.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Cheap probe that the credentials are still accepted.
    async fn validate_credentials(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<(), PlatformError>;

    async fn fetch_shop_profile(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<ShopProfile, PlatformError>;

    async fn fetch_catalog(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<Vec<CatalogItem>, PlatformError>;

    async fn fetch_orders(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<Vec<Order>, PlatformError>;

    async fn fetch_customers(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<Vec<Customer>, PlatformError>;
}
