//! In-memory balance cache sitting between callers and the balance store.
//!
//! Loads are single-flight per identity, mutations happen through callbacks run
//! under the cache lock, and dirty balances are persisted in batches by
//! [`BalanceCache::flush`].

use std::{
    collections::{HashMap, VecDeque},
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        balance_store::BalanceStore,
        storage::{StorageError, StorageResult},
    },
    state::{
        balance::{Balance, TierChange},
        tiers::ThresholdTable,
    },
};

/// Failure delivered to balance callbacks and cache operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("balance store unavailable: {0}")]
    Store(Arc<StorageError>),
    #[error("balance cache is closed")]
    Closed,
    /// The load task died before answering.
    #[error("balance load was abandoned")]
    Abandoned,
}

impl From<StorageError> for CacheError {
    fn from(err: StorageError) -> Self {
        CacheError::Store(Arc::new(err))
    }
}

/// Receives tier changes drained from mutated balances, in mutation order.
pub trait TierObserver: Send + Sync {
    /// Called while the cache lock is held; must not block.
    fn tier_changed(&self, change: &TierChange);
}

type BalanceCallback = Box<dyn FnOnce(Result<&mut Balance, CacheError>) + Send>;

#[derive(Clone, Copy)]
enum Scope {
    One(Uuid),
    All,
}

impl Scope {
    fn contains(self, identity: &Uuid) -> bool {
        match self {
            Scope::One(target) => target == *identity,
            Scope::All => true,
        }
    }
}

/// Shared handle to the cache; clones point at the same state.
#[derive(Clone)]
pub struct BalanceCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    state: Mutex<CacheState>,
    store: Arc<dyn BalanceStore>,
    observer: Option<Arc<dyn TierObserver>>,
    /// Serializes saves so an older snapshot never lands after a newer one.
    save_gate: Mutex<()>,
    next_instance: AtomicU64,
    loads_settled: Notify,
}

struct CacheState {
    balances: HashMap<Uuid, Balance>,
    pending: HashMap<Uuid, VecDeque<BalanceCallback>>,
    table: Arc<ThresholdTable>,
    closed: bool,
}

impl BalanceCache {
    pub fn new(
        store: Arc<dyn BalanceStore>,
        table: Arc<ThresholdTable>,
        observer: Option<Arc<dyn TierObserver>>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    balances: HashMap::new(),
                    pending: HashMap::new(),
                    table,
                    closed: false,
                }),
                store,
                observer,
                save_gate: Mutex::new(()),
                next_instance: AtomicU64::new(1),
                loads_settled: Notify::new(),
            }),
        }
    }

    /// Run `callback` against the balance of `identity`, loading it first if needed.
    ///
    /// Callbacks for one identity run in call order. While a load is in flight,
    /// later callers queue behind it instead of starting another load.
    pub async fn use_balance<F>(&self, identity: Uuid, callback: F)
    where
        F: FnOnce(Result<&mut Balance, CacheError>) + Send + 'static,
    {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            drop(state);
            callback(Err(CacheError::Closed));
            return;
        }

        if let Some(balance) = state.balances.get_mut(&identity) {
            callback(Ok(&mut *balance));
            self.publish(balance);
            return;
        }

        if let Some(waiters) = state.pending.get_mut(&identity) {
            waiters.push_back(Box::new(callback));
            return;
        }

        state
            .pending
            .insert(identity, VecDeque::from([Box::new(callback) as BalanceCallback]));
        drop(state);
        self.spawn_load(identity);
    }

    /// Future-returning form of [`use_balance`](Self::use_balance).
    pub async fn with_balance<F, R>(&self, identity: Uuid, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&mut Balance) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.use_balance(identity, move |result| {
            let _ = tx.send(result.map(f));
        })
        .await;
        rx.await.unwrap_or(Err(CacheError::Abandoned))
    }

    /// Start loading every identity not yet cached or loading. Returns how many loads started.
    pub async fn all_load<I>(&self, identities: I) -> usize
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut started = Vec::new();
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return 0;
            }
            for identity in identities {
                if state.balances.contains_key(&identity) || state.pending.contains_key(&identity)
                {
                    continue;
                }
                state.pending.insert(identity, VecDeque::new());
                started.push(identity);
            }
        }

        for identity in &started {
            self.spawn_load(*identity);
        }
        started.len()
    }

    /// Persist every dirty balance in one batch. Returns the batch size.
    ///
    /// A balance mutated while the save is in flight stays dirty.
    pub async fn flush(&self) -> Result<usize, CacheError> {
        let _gate = self.inner.save_gate.lock().await;
        let snapshot = {
            let state = self.inner.state.lock().await;
            dirty_snapshot(&state, Scope::All)
        };
        if snapshot.is_empty() {
            return Ok(0);
        }

        if let Err(err) = self.save(&snapshot).await {
            warn!(count = snapshot.len(), error = %err, "failed to flush dirty balances");
            return Err(err.into());
        }

        let mut state = self.inner.state.lock().await;
        clear_saved(&mut state, &snapshot);
        debug!(count = snapshot.len(), "flushed dirty balances");
        Ok(snapshot.len())
    }

    /// Persist and evict one identity, waiting for its in-flight load first.
    ///
    /// If the final save fails the balance is evicted anyway and the error returned.
    pub async fn unload(&self, identity: Uuid) -> Result<(), CacheError> {
        self.await_pending(Some(identity)).await;
        self.persist_and_evict(Scope::One(identity)).await
    }

    /// Persist and evict everything, then release the store. Later calls are no-ops.
    pub async fn close(&self) -> Result<(), CacheError> {
        let store = match self.detach().await {
            Ok(store) => store,
            Err(CacheError::Closed) => return Ok(()),
            Err(err) => {
                self.inner.store.close().await?;
                return Err(err);
            }
        };
        store.close().await?;
        info!("balance cache closed");
        Ok(())
    }

    /// Like [`close`](Self::close) but leaves the store open and hands it back,
    /// so it can be reused by a replacement cache or a migration.
    pub async fn detach(&self) -> Result<Arc<dyn BalanceStore>, CacheError> {
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(CacheError::Closed);
            }
            state.closed = true;
        }
        self.await_pending(None).await;
        self.persist_and_evict(Scope::All).await?;
        Ok(Arc::clone(&self.inner.store))
    }

    /// Swap the tier ladder and re-resolve every cached balance.
    pub async fn install_tiers(&self, table: Arc<ThresholdTable>) {
        let mut state = self.inner.state.lock().await;
        for balance in state.balances.values_mut() {
            balance.rebind(Arc::clone(&table));
        }
        state.table = table;
    }

    pub async fn tiers(&self) -> Arc<ThresholdTable> {
        Arc::clone(&self.inner.state.lock().await.table)
    }

    pub fn store(&self) -> Arc<dyn BalanceStore> {
        Arc::clone(&self.inner.store)
    }

    pub async fn is_loaded(&self, identity: Uuid) -> bool {
        self.inner.state.lock().await.balances.contains_key(&identity)
    }

    pub async fn loaded_identities(&self) -> Vec<Uuid> {
        self.inner.state.lock().await.balances.keys().copied().collect()
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }

    fn spawn_load(&self, identity: Uuid) {
        let cache = self.clone();
        tokio::spawn(async move {
            let load = cache.inner.store.load_points(identity);
            let outcome = match AssertUnwindSafe(load).catch_unwind().await {
                Ok(loaded) => settle_loaded(identity, loaded),
                Err(_) => Err(CacheError::Abandoned),
            };
            cache.complete_load(identity, outcome).await;
        });
    }

    async fn complete_load(&self, identity: Uuid, outcome: Result<i64, CacheError>) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let waiters = state.pending.remove(&identity).unwrap_or_default();

        match outcome {
            Ok(points) => {
                let instance = self.inner.next_instance.fetch_add(1, Ordering::Relaxed);
                let table = Arc::clone(&state.table);
                let balance = state
                    .balances
                    .entry(identity)
                    .or_insert_with(|| Balance::loaded(identity, instance, points, table));
                for waiter in waiters {
                    waiter(Ok(&mut *balance));
                }
                self.publish(balance);
            }
            Err(err) => {
                warn!(%identity, error = %err, waiters = waiters.len(), "failed to load balance");
                for waiter in waiters {
                    waiter(Err(err.clone()));
                }
            }
        }

        self.inner.loads_settled.notify_waiters();
    }

    fn publish(&self, balance: &mut Balance) {
        let changes = balance.take_tier_changes();
        if let Some(observer) = &self.inner.observer {
            for change in &changes {
                observer.tier_changed(change);
            }
        }
    }

    async fn await_pending(&self, identity: Option<Uuid>) {
        loop {
            let settled = self.inner.loads_settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            let busy = {
                let state = self.inner.state.lock().await;
                match identity {
                    Some(identity) => state.pending.contains_key(&identity),
                    None => !state.pending.is_empty(),
                }
            };
            if !busy {
                return;
            }
            settled.await;
        }
    }

    /// Save dirty balances in `scope` until none is left, then evict them in
    /// the same critical section as the final dirty check.
    async fn persist_and_evict(&self, scope: Scope) -> Result<(), CacheError> {
        let _gate = self.inner.save_gate.lock().await;
        loop {
            let snapshot = {
                let mut state = self.inner.state.lock().await;
                let snapshot = dirty_snapshot(&state, scope);
                if snapshot.is_empty() {
                    state.balances.retain(|identity, _| !scope.contains(identity));
                    return Ok(());
                }
                snapshot
            };

            match self.save(&snapshot).await {
                Ok(()) => {
                    let mut state = self.inner.state.lock().await;
                    clear_saved(&mut state, &snapshot);
                }
                Err(err) => {
                    warn!(
                        count = snapshot.len(),
                        error = %err,
                        "failed to save balances before eviction; evicting anyway"
                    );
                    let mut state = self.inner.state.lock().await;
                    state.balances.retain(|identity, _| !scope.contains(identity));
                    return Err(err.into());
                }
            }
        }
    }

    async fn save(&self, snapshot: &[DirtyEntry]) -> StorageResult<()> {
        let batch = snapshot
            .iter()
            .map(|entry| (entry.identity, entry.points))
            .collect::<HashMap<_, _>>();
        self.inner.store.save_points(batch).await
    }
}

/// Map a raw store answer onto the points a fresh balance starts with.
fn settle_loaded(identity: Uuid, loaded: StorageResult<i64>) -> Result<i64, CacheError> {
    match loaded {
        Ok(points) if points < 0 => {
            warn!(%identity, points, "stored balance is negative; clamping to 0");
            Ok(0)
        }
        Ok(points) => Ok(points),
        Err(StorageError::NotFound { .. }) => Ok(0),
        Err(err) => Err(err.into()),
    }
}

struct DirtyEntry {
    identity: Uuid,
    instance: u64,
    points: i64,
}

fn dirty_snapshot(state: &CacheState, scope: Scope) -> Vec<DirtyEntry> {
    state
        .balances
        .iter()
        .filter(|(identity, balance)| balance.is_dirty() && scope.contains(identity))
        .map(|(identity, balance)| DirtyEntry {
            identity: *identity,
            instance: balance.instance(),
            points: balance.points(),
        })
        .collect()
}

fn clear_saved(state: &mut CacheState, snapshot: &[DirtyEntry]) {
    for entry in snapshot {
        if let Some(balance) = state.balances.get_mut(&entry.identity) {
            balance.clear_dirty_if_unchanged(entry.instance, entry.points);
        }
    }
}
