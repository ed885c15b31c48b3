//! Point commands: look up, give, take, set and reset balances.
//!
//! Identities without an open session are loaded for the command and unloaded
//! right after, so the change reaches the store immediately.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::points::{BalanceSummary, GiveAllResponse},
    error::ServiceError,
    state::{
        SharedState,
        balance::{Balance, OutOfRange, TierChange},
        cache::BalanceCache,
    },
};

type Mutation = Result<Option<TierChange>, OutOfRange>;

/// Current balance and tier of `identity`.
pub async fn summary(state: &SharedState, identity: Uuid) -> Result<BalanceSummary, ServiceError> {
    run(state, identity, |balance| Ok(BalanceSummary::from(&*balance))).await
}

/// Add `amount` points.
pub async fn give(
    state: &SharedState,
    identity: Uuid,
    amount: i64,
) -> Result<BalanceSummary, ServiceError> {
    mutate(state, identity, move |balance| balance.add_points(amount)).await
}

/// Remove `amount` points, stopping at zero instead of failing.
pub async fn take(
    state: &SharedState,
    identity: Uuid,
    amount: i64,
) -> Result<BalanceSummary, ServiceError> {
    mutate(state, identity, move |balance| {
        if amount < 0 {
            return Err(OutOfRange { attempted: amount });
        }
        match balance.remove_points(amount) {
            Err(OutOfRange { .. }) => balance.set_points(0),
            applied => applied,
        }
    })
    .await
}

/// Overwrite the balance with `points`.
pub async fn set(
    state: &SharedState,
    identity: Uuid,
    points: i64,
) -> Result<BalanceSummary, ServiceError> {
    mutate(state, identity, move |balance| balance.set_points(points)).await
}

pub async fn reset(state: &SharedState, identity: Uuid) -> Result<BalanceSummary, ServiceError> {
    set(state, identity, 0).await
}

/// Give `amount` points to every connected identity.
pub async fn give_all(state: &SharedState, amount: i64) -> Result<GiveAllResponse, ServiceError> {
    if amount < 0 {
        return Err(OutOfRange { attempted: amount }.into());
    }

    let cache = state.cache().await;
    let mut updated = Vec::new();
    let mut failed = Vec::new();
    for identity in state.connected() {
        let outcome = cache
            .with_balance(identity, move |balance| balance.add_points(amount))
            .await;
        match outcome {
            Ok(_) => updated.push(identity),
            Err(err) => {
                warn!(%identity, error = %err, "failed to give points to connected identity");
                failed.push(identity);
            }
        }
    }

    debug!(amount, count = updated.len(), "gave points to connected identities");
    Ok(GiveAllResponse {
        points: amount,
        updated,
        failed,
    })
}

async fn mutate<F>(state: &SharedState, identity: Uuid, f: F) -> Result<BalanceSummary, ServiceError>
where
    F: FnOnce(&mut Balance) -> Mutation + Send + 'static,
{
    run(state, identity, move |balance| {
        f(balance)?;
        Ok(BalanceSummary::from(&*balance))
    })
    .await
}

async fn run<F>(state: &SharedState, identity: Uuid, f: F) -> Result<BalanceSummary, ServiceError>
where
    F: FnOnce(&mut Balance) -> Result<BalanceSummary, OutOfRange> + Send + 'static,
{
    let cache = state.cache().await;
    let outcome = cache.with_balance(identity, f).await;
    release_offline(state, &cache, identity).await;
    Ok(outcome??)
}

/// Unload `identity` unless it has an open session. A failed save is logged only:
/// the command already took effect in memory.
async fn release_offline(state: &SharedState, cache: &BalanceCache, identity: Uuid) {
    if state.is_connected(identity) {
        return;
    }
    if let Err(err) = cache.unload(identity).await {
        warn!(%identity, error = %err, "failed to persist balance of offline identity");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::balance_store::InMemoryBalanceStore,
        state::AppState,
    };

    fn state_with(store: &InMemoryBalanceStore) -> SharedState {
        let config = AppConfig::default();
        let table = Arc::new(config.threshold_table().unwrap());
        AppState::new(config, Arc::new(store.clone()), table)
    }

    #[tokio::test]
    async fn offline_identity_is_persisted_and_unloaded() {
        let store = InMemoryBalanceStore::new();
        let state = state_with(&store);
        let identity = Uuid::new_v4();

        let summary = give(&state, identity, 150).await.unwrap();
        assert_eq!(summary.points, 150);
        assert_eq!(summary.tier, "Apprentice");
        assert_eq!(store.get(identity), Some(150));
        assert!(!state.cache().await.is_loaded(identity).await);
    }

    #[tokio::test]
    async fn connected_identity_stays_cached_until_flush() {
        let store = InMemoryBalanceStore::new();
        let state = state_with(&store);
        let identity = Uuid::new_v4();
        state.connect(identity);

        give(&state, identity, 20).await.unwrap();
        assert!(state.cache().await.is_loaded(identity).await);
        assert_eq!(store.get(identity), None);

        state.cache().await.flush().await.unwrap();
        assert_eq!(store.get(identity), Some(20));
    }

    #[tokio::test]
    async fn take_floors_at_zero() {
        let store = InMemoryBalanceStore::with_balances([(Uuid::nil(), 30)]);
        let state = state_with(&store);

        assert_eq!(take(&state, Uuid::nil(), 10).await.unwrap().points, 20);
        assert_eq!(take(&state, Uuid::nil(), 500).await.unwrap().points, 0);
        assert_eq!(store.get(Uuid::nil()), Some(0));
    }

    #[tokio::test]
    async fn negative_set_is_rejected_without_side_effects() {
        let store = InMemoryBalanceStore::with_balances([(Uuid::nil(), 30)]);
        let state = state_with(&store);

        let err = set(&state, Uuid::nil(), -1).await.unwrap_err();
        assert!(matches!(err, ServiceError::OutOfRange(_)));
        assert_eq!(summary(&state, Uuid::nil()).await.unwrap().points, 30);

        assert_eq!(reset(&state, Uuid::nil()).await.unwrap().points, 0);
    }

    #[tokio::test]
    async fn give_all_only_touches_connected_identities() {
        let store = InMemoryBalanceStore::new();
        let state = state_with(&store);
        let (online, offline) = (Uuid::new_v4(), Uuid::new_v4());
        state.connect(online);

        let response = give_all(&state, 5).await.unwrap();
        assert_eq!(response.updated, vec![online]);
        assert!(response.failed.is_empty());
        assert_eq!(summary(&state, online).await.unwrap().points, 5);
        assert_eq!(summary(&state, offline).await.unwrap().points, 0);
    }
}
