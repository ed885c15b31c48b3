pub mod balance;
pub mod cache;
mod sse;
pub mod tiers;

use std::{sync::Arc, time::Duration};

use dashmap::DashSet;
use tokio::{
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, watch},
    task::JoinHandle,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::balance_store::BalanceStore,
    dto::sse::{ServerEvent, SystemStatus},
    services::flush_scheduler,
};

pub use self::sse::SseHub;
use self::{
    cache::{BalanceCache, TierObserver},
    tiers::ThresholdTable,
};

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Central application state: active configuration, balance cache and connected identities.
pub struct AppState {
    config: RwLock<AppConfig>,
    /// Requests hold the read side for their whole operation so a cache swap
    /// waits for them and blocks newcomers until the new cache is installed.
    cache: RwLock<BalanceCache>,
    sessions: DashSet<Uuid>,
    sse: Arc<SseHub>,
    degraded: watch::Sender<bool>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes reload, migration and shutdown.
    lifecycle_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] around a cache over `store`.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn BalanceStore>,
        table: Arc<ThresholdTable>,
    ) -> SharedState {
        let sse = Arc::new(SseHub::new(SSE_CAPACITY));
        let cache = BalanceCache::new(
            store,
            table,
            Some(sse.clone() as Arc<dyn TierObserver>),
        );
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            config: RwLock::new(config),
            cache: RwLock::new(cache),
            sessions: DashSet::new(),
            sse,
            degraded: degraded_tx,
            flush_task: Mutex::new(None),
            lifecycle_gate: Mutex::new(()),
        })
    }

    /// Build a cache wired to this state's SSE hub.
    pub fn new_cache(&self, store: Arc<dyn BalanceStore>, table: Arc<ThresholdTable>) -> BalanceCache {
        BalanceCache::new(
            store,
            table,
            Some(self.sse.clone() as Arc<dyn TierObserver>),
        )
    }

    /// Shared access to the active cache. Hold the guard for the whole operation.
    pub async fn cache(&self) -> RwLockReadGuard<'_, BalanceCache> {
        self.cache.read().await
    }

    /// Exclusive access used to swap the cache.
    pub async fn cache_mut(&self) -> RwLockWriteGuard<'_, BalanceCache> {
        self.cache.write().await
    }

    pub async fn config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    pub async fn set_config(&self, config: AppConfig) {
        *self.config.write().await = config;
    }

    pub async fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle_gate.lock().await
    }

    /// Mark `identity` as connected. Returns `false` if it already was.
    pub fn connect(&self, identity: Uuid) -> bool {
        self.sessions.insert(identity)
    }

    /// Forget `identity`. Returns `false` if it was not connected.
    pub fn disconnect(&self, identity: Uuid) -> bool {
        self.sessions.remove(&identity).is_some()
    }

    pub fn is_connected(&self, identity: Uuid) -> bool {
        self.sessions.contains(&identity)
    }

    pub fn connected(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Broadcast hub used for the tier SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.degraded.send_replace(value) == value {
            return;
        }
        if let Ok(event) = ServerEvent::json(
            Some("system_status".to_string()),
            &SystemStatus { degraded: value },
        ) {
            self.sse.broadcast(event);
        }
    }

    /// (Re)start the periodic flush against the active cache.
    pub async fn start_flush_task(&self, interval: Duration) {
        let cache = self.cache.read().await.clone();
        let handle = flush_scheduler::spawn(cache, interval);
        if let Some(previous) = self.flush_task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    pub async fn stop_flush_task(&self) {
        if let Some(handle) = self.flush_task.lock().await.take() {
            handle.abort();
        }
    }

    /// Stop background work and close the cache, persisting every dirty balance.
    pub async fn shutdown(&self) -> Result<(), cache::CacheError> {
        let _lifecycle = self.lifecycle().await;
        self.stop_flush_task().await;
        let cache = self.cache.write().await;
        cache.close().await?;
        info!("balances persisted; state shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::balance_store::InMemoryBalanceStore;

    fn state() -> (SharedState, InMemoryBalanceStore) {
        let store = InMemoryBalanceStore::new();
        let config = AppConfig::default();
        let table = Arc::new(config.threshold_table().unwrap());
        (AppState::new(config, Arc::new(store.clone()), table), store)
    }

    #[tokio::test]
    async fn sessions_track_connections() {
        let (state, _) = state();
        let identity = Uuid::new_v4();
        assert!(state.connect(identity));
        assert!(!state.connect(identity));
        assert_eq!(state.connected(), vec![identity]);
        assert!(state.disconnect(identity));
        assert!(!state.is_connected(identity));
    }

    #[tokio::test]
    async fn degraded_changes_are_broadcast_once() {
        let (state, _) = state();
        let mut events = state.sse().subscribe();
        state.update_degraded(true);
        state.update_degraded(true);
        assert!(state.is_degraded());
        assert_eq!(
            events.try_recv().unwrap().event.as_deref(),
            Some("system_status")
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_persists_dirty_balances() {
        let (state, store) = state();
        let identity = Uuid::new_v4();
        state
            .cache()
            .await
            .with_balance(identity, |balance| balance.add_points(9))
            .await
            .unwrap()
            .unwrap();

        state.shutdown().await.unwrap();
        assert_eq!(store.get(identity), Some(9));
        assert!(state.cache().await.is_closed().await);
    }
}
