mod http_index;
mod memory;
mod models;

pub use http_index::HttpSearchIndex;
pub use memory::InMemorySearchIndex;
pub use models::{IndexDocument, IndexError, Partition, PartitionStats};

use async_trait::async_trait;

/// Partitioned document index that the analytics assistant retrieves from.
///
/// Every shop owns one namespace in the index, split into the fixed set of
/// partitions in [`Partition::ALL`]. An empty partition is a valid state; a
/// missing one is not, so writers must call `ensure_partition` even when they
/// have nothing to upsert.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create the partition if it does not exist. Idempotent.
    async fn ensure_partition(&self, shop_id: &str, partition: Partition)
        -> Result<(), IndexError>;

    /// Insert or replace documents by id. Returns how many were written.
    async fn upsert_documents(
        &self,
        shop_id: &str,
        partition: Partition,
        documents: &[IndexDocument],
    ) -> Result<usize, IndexError>;

    async fn partition_exists(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<bool, IndexError>;

    async fn partition_stats(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<PartitionStats, IndexError>;

    /// Drop the partition and everything in it. Removing a partition that
    /// does not exist is not an error.
    async fn delete_partition(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<(), IndexError>;
}
