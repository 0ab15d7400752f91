//! HTTP client for the merchant platform's admin API.

use super::models::{
    CatalogItem, Customer, Order, PlatformCredentials, PlatformError, ShopProfile,
};
use super::PlatformClient;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct HttpPlatformClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPlatformClient {
    /// Create a new platform client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the platform API (e.g., "https://platform.example.com")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: String, timeout_sec: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    fn endpoint_url(&self, credentials: &PlatformCredentials, path: &str) -> String {
        format!("{}/shops/{}{}", self.base_url, credentials.shop_domain, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        credentials: &PlatformCredentials,
        path: &str,
    ) -> Result<T, PlatformError> {
        let url = self.endpoint_url(credentials, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&credentials.access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PlatformError::Network(format!("invalid response body: {e}")));
        }

        match status.as_u16() {
            401 | 403 => Err(PlatformError::AuthInvalid),
            429 => Err(PlatformError::RateLimited),
            code => {
                let message = response.text().await.unwrap_or_default();
                Err(PlatformError::Api {
                    status: code,
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn validate_credentials(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<(), PlatformError> {
        // The profile endpoint is the cheapest authenticated call the
        // platform exposes, so it doubles as the credential probe.
        self.get_json::<ShopProfile>(credentials, "/profile")
            .await
            .map(|_| ())
    }

    async fn fetch_shop_profile(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<ShopProfile, PlatformError> {
        self.get_json(credentials, "/profile").await
    }

    async fn fetch_catalog(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<Vec<CatalogItem>, PlatformError> {
        self.get_json(credentials, "/products").await
    }

    async fn fetch_orders(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<Vec<Order>, PlatformError> {
        self.get_json(credentials, "/orders").await
    }

    async fn fetch_customers(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<Vec<Customer>, PlatformError> {
        self.get_json(credentials, "/customers").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_stripped() {
        let client = HttpPlatformClient::new("http://localhost:9999/".to_string(), 5);
        let credentials = PlatformCredentials {
            shop_domain: "acme.example.com".to_string(),
            access_token: "shpat_token".to_string(),
        };

        assert_eq!(
            client.endpoint_url(&credentials, "/orders"),
            "http://localhost:9999/shops/acme.example.com/orders"
        );
    }
}
