use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-shop credentials for the platform admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCredentials {
    pub shop_domain: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("platform rejected the credentials")]
    AuthInvalid,
    #[error("platform rate limit hit")]
    RateLimited,
    #[error("platform request timed out")]
    Timeout,
    #[error("platform returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error talking to the platform: {0}")]
    Network(String),
}

impl PlatformError {
    /// Returns true if a later attempt with the same credentials can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::AuthInvalid => false,
            PlatformError::RateLimited => true,
            PlatformError::Timeout => true,
            PlatformError::Api { status, .. } => *status >= 500,
            PlatformError::Network(_) => true,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlatformError::Timeout
        } else {
            PlatformError::Network(err.to_string())
        }
    }
}

/// Shop metadata as the platform reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopProfile {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub email: Option<String>,
    pub currency: String,
    pub timezone: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub product_type: Option<String>,
    pub vendor: Option<String>,
    pub price: f64,
    pub inventory_quantity: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: i64,
    pub total_price: f64,
    pub currency: String,
    pub financial_status: Option<String>,
    /// RFC 3339 timestamp from the platform, kept as-is.
    pub created_at: String,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Option<String>,
    pub title: String,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub orders_count: i64,
    pub total_spent: f64,
    pub city: Option<String>,
    pub country: Option<String>,
}
