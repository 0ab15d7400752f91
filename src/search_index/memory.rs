use super::models::{IndexDocument, IndexError, Partition, PartitionStats};
use super::SearchIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process index used when no external index service is configured,
/// and as the backend for tests.
#[derive(Default)]
pub struct InMemorySearchIndex {
    shops: RwLock<HashMap<String, HashMap<Partition, Vec<IndexDocument>>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn ensure_partition(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<(), IndexError> {
        let mut shops = self.shops.write().unwrap();
        shops
            .entry(shop_id.to_string())
            .or_default()
            .entry(partition)
            .or_default();
        Ok(())
    }

    async fn upsert_documents(
        &self,
        shop_id: &str,
        partition: Partition,
        documents: &[IndexDocument],
    ) -> Result<usize, IndexError> {
        let mut shops = self.shops.write().unwrap();
        let existing = shops
            .entry(shop_id.to_string())
            .or_default()
            .entry(partition)
            .or_default();

        for document in documents {
            match existing.iter_mut().find(|d| d.id == document.id) {
                Some(slot) => *slot = document.clone(),
                None => existing.push(document.clone()),
            }
        }
        Ok(documents.len())
    }

    async fn partition_exists(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<bool, IndexError> {
        let shops = self.shops.read().unwrap();
        Ok(shops
            .get(shop_id)
            .map(|partitions| partitions.contains_key(&partition))
            .unwrap_or(false))
    }

    async fn partition_stats(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<PartitionStats, IndexError> {
        let shops = self.shops.read().unwrap();
        match shops.get(shop_id).and_then(|p| p.get(&partition)) {
            Some(documents) => Ok(PartitionStats {
                document_count: documents.len(),
            }),
            None => Err(IndexError::Rejected(format!(
                "partition {} does not exist for shop {}",
                partition, shop_id
            ))),
        }
    }

    async fn delete_partition(
        &self,
        shop_id: &str,
        partition: Partition,
    ) -> Result<(), IndexError> {
        let mut shops = self.shops.write().unwrap();
        if let Some(partitions) = shops.get_mut(shop_id) {
            partitions.remove(&partition);
            if partitions.is_empty() {
                shops.remove(shop_id);
            }
        }
        Ok(())
    }
}
