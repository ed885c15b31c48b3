//! Connect and disconnect hooks: a session keeps the balance cached.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        points::BalanceSummary,
        session::{SessionClosed, SessionOpened},
    },
    error::ServiceError,
    state::SharedState,
};

/// Mark `identity` connected and load its balance.
pub async fn open(state: &SharedState, identity: Uuid) -> Result<SessionOpened, ServiceError> {
    let cache = state.cache().await;
    let newly_connected = state.connect(identity);
    match cache
        .with_balance(identity, |balance| BalanceSummary::from(&*balance))
        .await
    {
        Ok(balance) => {
            info!(%identity, newly_connected, "session opened");
            Ok(SessionOpened {
                balance,
                newly_connected,
            })
        }
        Err(err) => {
            if newly_connected {
                state.disconnect(identity);
            }
            Err(err.into())
        }
    }
}

/// Mark `identity` disconnected, persist and evict its balance.
pub async fn close(state: &SharedState, identity: Uuid) -> Result<SessionClosed, ServiceError> {
    let cache = state.cache().await;
    let was_connected = state.disconnect(identity);
    if let Err(err) = cache.unload(identity).await {
        warn!(%identity, error = %err, "balance evicted without a final save");
        return Err(err.into());
    }
    info!(%identity, was_connected, "session closed");
    Ok(SessionClosed {
        identity,
        was_connected,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::balance_store::InMemoryBalanceStore, services::points_service,
        state::AppState,
    };

    #[tokio::test]
    async fn session_lifecycle_persists_on_close() {
        let store = InMemoryBalanceStore::with_balances([(Uuid::nil(), 90)]);
        let config = AppConfig::default();
        let table = Arc::new(config.threshold_table().unwrap());
        let state = AppState::new(config, Arc::new(store.clone()), table);

        let opened = open(&state, Uuid::nil()).await.unwrap();
        assert!(opened.newly_connected);
        assert_eq!(opened.balance.points, 90);
        assert!(!open(&state, Uuid::nil()).await.unwrap().newly_connected);

        points_service::give(&state, Uuid::nil(), 10).await.unwrap();
        assert_eq!(store.get(Uuid::nil()), Some(90));

        let closed = close(&state, Uuid::nil()).await.unwrap();
        assert!(closed.was_connected);
        assert_eq!(store.get(Uuid::nil()), Some(100));
        assert!(!state.cache().await.is_loaded(Uuid::nil()).await);
    }
}
