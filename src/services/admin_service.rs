//! Business logic behind the admin routes: configuration reload, storage
//! migration and on-demand flush. Reload and migration swap the balance cache
//! while holding its write guard, so point commands wait instead of failing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::{AppConfig, StorageBackend},
    dao::balance_store::{self, BalanceStore},
    dto::admin::{FlushResponse, MigrateResponse, ReloadResponse},
    error::ServiceError,
    services::migration,
    state::SharedState,
};

/// Re-read the configuration file and apply it.
pub async fn reload(state: &SharedState) -> Result<ReloadResponse, ServiceError> {
    let config = AppConfig::load()?;
    apply_config(state, config).await
}

/// Apply `config`: new tier ladder, and a new store when the storage settings changed.
///
/// Everything that can fail is prepared before the active cache is touched,
/// so an error leaves the previous setup running.
pub async fn apply_config(
    state: &SharedState,
    config: AppConfig,
) -> Result<ReloadResponse, ServiceError> {
    let _lifecycle = state.lifecycle().await;
    let table = Arc::new(config.threshold_table()?);
    let previous = state.config().await;
    let store_replaced = previous.storage != config.storage;

    if store_replaced {
        let store = balance_store::connect(&config.storage).await?;
        state.stop_flush_task().await;
        let mut cache = state.cache_mut().await;
        if let Err(err) = cache.close().await {
            warn!(error = %err, "previous balance cache closed with unsaved balances");
        }
        *cache = state.new_cache(store, Arc::clone(&table));
    } else {
        state.cache().await.install_tiers(Arc::clone(&table)).await;
    }

    let response = ReloadResponse {
        tiers: table.len(),
        backend: config.storage.backend,
        store_replaced,
        warmed: 0,
    };
    let interval = config.save_interval;
    state.set_config(config).await;
    state.start_flush_task(interval).await;
    let warmed = state.cache().await.all_load(state.connected()).await;

    info!(
        tiers = response.tiers,
        store_replaced,
        warmed,
        "configuration reloaded"
    );
    Ok(ReloadResponse { warmed, ..response })
}

/// Copy every balance to the `target` backend and switch to it.
///
/// The switch only lives in memory; the configuration file is not rewritten.
pub async fn migrate(
    state: &SharedState,
    target: StorageBackend,
) -> Result<MigrateResponse, ServiceError> {
    let storage = state.config().await.storage;
    if storage.backend == target {
        return Err(ServiceError::InvalidInput(format!(
            "already using the {} backend",
            target.as_str()
        )));
    }
    let store = balance_store::connect(&storage.with_backend(target)).await?;
    switch_store(state, target, store).await
}

async fn switch_store(
    state: &SharedState,
    target: StorageBackend,
    target_store: Arc<dyn BalanceStore>,
) -> Result<MigrateResponse, ServiceError> {
    let _lifecycle = state.lifecycle().await;
    let mut config = state.config().await;
    let from = config.storage.backend;

    let mut cache = state.cache_mut().await;
    // Fail early, with the cache untouched, when the source cannot take a save.
    cache.flush().await?;
    state.stop_flush_task().await;

    let table = cache.tiers().await;
    let source = cache.store();
    let copied = match cache.detach().await {
        Ok(_) => migration::copy_balances(source.as_ref(), target_store.as_ref())
            .await
            .map_err(ServiceError::from),
        Err(err) => Err(err.into()),
    };

    let copied = match copied {
        Ok(copied) => copied,
        Err(err) => {
            warn!(error = %err, to = target.as_str(), "migration failed; staying on the source store");
            *cache = state.new_cache(source, table);
            drop(cache);
            if let Err(close_err) = target_store.close().await {
                warn!(error = %close_err, "failed to close target store");
            }
            restart(state, config.save_interval).await;
            return Err(err);
        }
    };

    *cache = state.new_cache(target_store, table);
    drop(cache);
    if let Err(err) = source.close().await {
        warn!(error = %err, "failed to close previous store");
    }

    config.storage.backend = target;
    let interval = config.save_interval;
    state.set_config(config).await;
    let warmed = restart(state, interval).await;

    info!(
        from = from.as_str(),
        to = target.as_str(),
        copied,
        "balances migrated"
    );
    Ok(MigrateResponse {
        from,
        to: target,
        copied,
        warmed,
    })
}

/// Persist every dirty balance now.
pub async fn flush(state: &SharedState) -> Result<FlushResponse, ServiceError> {
    let saved = state.cache().await.flush().await?;
    Ok(FlushResponse { saved })
}

async fn restart(state: &SharedState, interval: std::time::Duration) -> usize {
    state.start_flush_task(interval).await;
    state.cache().await.all_load(state.connected()).await
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::balance_store::InMemoryBalanceStore,
        services::points_service,
        state::{AppState, tiers::TierEntry},
    };

    fn state_with(store: &InMemoryBalanceStore) -> SharedState {
        let config = AppConfig::default();
        let table = Arc::new(config.threshold_table().unwrap());
        AppState::new(config, Arc::new(store.clone()), table)
    }

    #[tokio::test]
    async fn reload_swaps_tiers_in_place() {
        let store = InMemoryBalanceStore::new();
        let state = state_with(&store);
        let identity = Uuid::new_v4();
        state.connect(identity);
        points_service::give(&state, identity, 150).await.unwrap();

        let mut config = AppConfig::default();
        config.tiers = vec![
            TierEntry {
                group: "novice".into(),
                display_name: None,
                points: 0,
            },
            TierEntry {
                group: "master".into(),
                display_name: Some("Master".into()),
                points: 100,
            },
        ];
        let response = apply_config(&state, config).await.unwrap();
        assert!(!response.store_replaced);
        assert_eq!(response.tiers, 2);

        let summary = points_service::summary(&state, identity).await.unwrap();
        assert_eq!(summary.tier, "Master");
        assert_eq!(summary.points, 150);
    }

    #[tokio::test]
    async fn invalid_reload_keeps_previous_setup() {
        let store = InMemoryBalanceStore::new();
        let state = state_with(&store);
        let mut config = AppConfig::default();
        config.tiers.clear();

        assert!(matches!(
            apply_config(&state, config).await,
            Err(ServiceError::Config(_))
        ));
        assert_eq!(state.cache().await.tiers().await.len(), 4);
    }

    #[tokio::test]
    async fn migration_copies_and_switches() {
        let source = InMemoryBalanceStore::with_balances([(Uuid::nil(), 40)]);
        let state = state_with(&source);
        let identity = Uuid::new_v4();
        state.connect(identity);
        points_service::give(&state, identity, 7).await.unwrap();

        let target = InMemoryBalanceStore::new();
        let response = switch_store(&state, StorageBackend::Couch, Arc::new(target.clone()))
            .await
            .unwrap();

        assert_eq!(response.copied, 2);
        assert_eq!(target.get(Uuid::nil()), Some(40));
        assert_eq!(target.get(identity), Some(7));
        assert_eq!(state.config().await.storage.backend, StorageBackend::Couch);

        points_service::give(&state, identity, 3).await.unwrap();
        flush(&state).await.unwrap();
        assert_eq!(target.get(identity), Some(10));
        assert_eq!(source.get(identity), Some(7));
    }

    #[tokio::test]
    async fn migrating_to_the_active_backend_is_rejected() {
        let state = state_with(&InMemoryBalanceStore::new());
        assert!(matches!(
            migrate(&state, StorageBackend::Memory).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
