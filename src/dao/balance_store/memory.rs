//! Process-local balance store used for development setups and tests.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    balance_store::BalanceStore, models::BalanceEntity, storage::StorageResult,
};

/// Balance store keeping every value in a shared concurrent map.
///
/// Clones share the same map, so a store handed to a new cache after
/// [`close`](BalanceStore::close) still sees everything saved before.
#[derive(Clone, Default)]
pub struct InMemoryBalanceStore {
    balances: Arc<DashMap<Uuid, i64>>,
}

impl InMemoryBalanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given balances.
    pub fn with_balances<I>(balances: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, i64)>,
    {
        Self {
            balances: Arc::new(balances.into_iter().collect()),
        }
    }

    /// Last saved value for `identity`, if any.
    pub fn get(&self, identity: Uuid) -> Option<i64> {
        self.balances.get(&identity).map(|entry| *entry.value())
    }

    /// Number of identities with a saved balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Whether nothing was saved yet.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl BalanceStore for InMemoryBalanceStore {
    fn load_points(&self, identity: Uuid) -> BoxFuture<'static, StorageResult<i64>> {
        let points = self.get(identity).unwrap_or(0);
        Box::pin(async move { Ok(points) })
    }

    fn save_points(&self, batch: HashMap<Uuid, i64>) -> BoxFuture<'static, StorageResult<()>> {
        let balances = Arc::clone(&self.balances);
        Box::pin(async move {
            for (identity, points) in batch {
                balances.insert(identity, points);
            }
            Ok(())
        })
    }

    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<BalanceEntity>>> {
        let entities = self
            .balances
            .iter()
            .map(|entry| BalanceEntity {
                id: *entry.key(),
                points: *entry.value(),
            })
            .collect::<Vec<_>>();
        Box::pin(async move { Ok(entities) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_identity_loads_as_zero() {
        let store = InMemoryBalanceStore::new();
        assert_eq!(store.load_points(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn saved_batch_is_visible_to_clones() {
        let store = InMemoryBalanceStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .save_points(HashMap::from([(alice, 40), (bob, 7)]))
            .await
            .unwrap();

        let clone = store.clone();
        assert_eq!(clone.load_points(alice).await.unwrap(), 40);
        assert_eq!(clone.get(bob), Some(7));

        let mut all = clone.load_all().await.unwrap();
        all.sort_by_key(|entity| entity.points);
        assert_eq!(
            all,
            vec![
                BalanceEntity { id: bob, points: 7 },
                BalanceEntity {
                    id: alice,
                    points: 40
                },
            ]
        );
    }
}
