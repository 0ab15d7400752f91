use axum::extract::FromRef;

use crate::jobs::{CircuitBreakerRegistry, JobDispatcher, LockManager};
use crate::lifecycle::ShopLifecycle;
use crate::search_index::SearchIndex;
use crate::shop_store::ShopStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedShopStore = Arc<dyn ShopStore>;
pub type GuardedSearchIndex = Arc<dyn SearchIndex>;
pub type GuardedLifecycle = Arc<ShopLifecycle>;
pub type GuardedLockManager = Arc<LockManager>;
pub type GuardedBreakerRegistry = Arc<CircuitBreakerRegistry>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub dispatcher: JobDispatcher,
    pub lifecycle: GuardedLifecycle,
    pub shop_store: GuardedShopStore,
    pub search_index: GuardedSearchIndex,
    pub locks: GuardedLockManager,
    pub breakers: GuardedBreakerRegistry,
    pub hash: String,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for JobDispatcher {
    fn from_ref(input: &ServerState) -> Self {
        input.dispatcher.clone()
    }
}

impl FromRef<ServerState> for GuardedLifecycle {
    fn from_ref(input: &ServerState) -> Self {
        input.lifecycle.clone()
    }
}

impl FromRef<ServerState> for GuardedShopStore {
    fn from_ref(input: &ServerState) -> Self {
        input.shop_store.clone()
    }
}

impl FromRef<ServerState> for GuardedSearchIndex {
    fn from_ref(input: &ServerState) -> Self {
        input.search_index.clone()
    }
}

impl FromRef<ServerState> for GuardedLockManager {
    fn from_ref(input: &ServerState) -> Self {
        input.locks.clone()
    }
}

impl FromRef<ServerState> for GuardedBreakerRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.breakers.clone()
    }
}
