use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Ping the active store and report the degraded flag alongside cache occupancy.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let backend = state.config().await.storage.backend;
    let cache = state.cache().await;
    if let Err(err) = cache.store().health_check().await {
        warn!(error = %err, "storage health check failed");
    }
    let loaded = cache.loaded_identities().await.len();
    drop(cache);

    let status = if state.is_degraded() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };
    HealthResponse {
        status,
        backend,
        connected: state.connected().len(),
        loaded,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::{AppConfig, StorageBackend},
        dao::balance_store::InMemoryBalanceStore,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_flag_and_occupancy() {
        let config = AppConfig::default();
        let table = Arc::new(config.threshold_table().unwrap());
        let state = AppState::new(config, Arc::new(InMemoryBalanceStore::new()), table);
        let identity = Uuid::new_v4();
        state.connect(identity);
        state.cache().await.with_balance(identity, |_| ()).await.unwrap();

        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.backend, StorageBackend::Memory);
        assert_eq!((health.connected, health.loaded), (1, 1));

        state.update_degraded(true);
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);
    }
}
