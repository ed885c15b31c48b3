use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, warn};

use crate::state::cache::BalanceCache;

/// Flush `cache` every `period` until the returned task is aborted.
///
/// A failed flush leaves the balances dirty; the next tick retries them.
pub fn spawn(cache: BalanceCache, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if cache.is_closed().await {
                debug!("balance cache closed; stopping flush task");
                break;
            }
            match cache.flush().await {
                Ok(0) => {}
                Ok(count) => debug!(count, "periodic flush saved balances"),
                Err(err) => warn!(error = %err, "periodic flush failed; will retry"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    };

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            balance_store::{BalanceStore, InMemoryBalanceStore},
            models::BalanceEntity,
            storage::{StorageError, StorageResult},
        },
    };

    /// Memory store whose saves fail while `offline` is set.
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: InMemoryBalanceStore,
        offline: Arc<AtomicBool>,
    }

    impl BalanceStore for FlakyStore {
        fn load_points(&self, identity: Uuid) -> BoxFuture<'static, StorageResult<i64>> {
            self.inner.load_points(identity)
        }

        fn save_points(&self, batch: HashMap<Uuid, i64>) -> BoxFuture<'static, StorageResult<()>> {
            if self.offline.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(StorageError::Unavailable {
                        message: "store offline".into(),
                        source: "offline".into(),
                    })
                });
            }
            self.inner.save_points(batch)
        }

        fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<BalanceEntity>>> {
            self.inner.load_all()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }

        fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.close()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_is_retried_on_the_next_one() {
        let store = FlakyStore::default();
        store.offline.store(true, Ordering::SeqCst);
        let table = Arc::new(AppConfig::default().threshold_table().unwrap());
        let cache = BalanceCache::new(Arc::new(store.clone()), table, None);
        let identity = Uuid::new_v4();
        cache
            .with_balance(identity, |balance| balance.add_points(9))
            .await
            .unwrap()
            .unwrap();

        let task = spawn(cache.clone(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!task.is_finished());
        assert_eq!(store.inner.get(identity), None);
        assert!(cache.with_balance(identity, |b| b.is_dirty()).await.unwrap());

        store.offline.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.inner.get(identity), Some(9));
        assert!(!cache.with_balance(identity, |b| b.is_dirty()).await.unwrap());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_balances_are_saved_on_each_tick() {
        let store = InMemoryBalanceStore::new();
        let table = Arc::new(AppConfig::default().threshold_table().unwrap());
        let cache = BalanceCache::new(Arc::new(store.clone()), table, None);
        let identity = Uuid::new_v4();
        cache
            .with_balance(identity, |balance| balance.add_points(3))
            .await
            .unwrap()
            .unwrap();

        let task = spawn(cache.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.get(identity), Some(3));
        assert!(!cache.with_balance(identity, |b| b.is_dirty()).await.unwrap());

        cache.close().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(task.is_finished());
    }
}
