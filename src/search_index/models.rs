use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of per-shop index partitions.
///
/// `DialogueHistory` is written by the dashboard as merchants talk to the
/// assistant, never by sync. Sync only guarantees the partition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    ShopProfile,
    Catalog,
    Orders,
    Customers,
    Aggregates,
    DialogueHistory,
}

impl Partition {
    pub const ALL: [Partition; 6] = [
        Partition::ShopProfile,
        Partition::Catalog,
        Partition::Orders,
        Partition::Customers,
        Partition::Aggregates,
        Partition::DialogueHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::ShopProfile => "shop-profile",
            Partition::Catalog => "catalog",
            Partition::Orders => "orders",
            Partition::Customers => "customers",
            Partition::Aggregates => "aggregates",
            Partition::DialogueHistory => "dialogue-history",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shop-profile" => Some(Partition::ShopProfile),
            "catalog" => Some(Partition::Catalog),
            "orders" => Some(Partition::Orders),
            "customers" => Some(Partition::Customers),
            "aggregates" => Some(Partition::Aggregates),
            "dialogue-history" => Some(Partition::DialogueHistory),
            _ => None,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One retrievable document.
///
/// `text` is what gets embedded and matched against merchant questions;
/// `metadata` carries the structured fields the dashboard renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStats {
    pub document_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index backend unavailable: {0}")]
    Unavailable(String),
    #[error("index request timed out")]
    Timeout,
    #[error("index rejected the request: {0}")]
    Rejected(String),
}

impl IndexError {
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexError::Unavailable(_) => true,
            IndexError::Timeout => true,
            IndexError::Rejected(_) => false,
        }
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IndexError::Timeout
        } else {
            IndexError::Unavailable(err.to_string())
        }
    }
}
