use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    config::StorageSettings,
    dao::balance_store::{self, BalanceStore},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Open the configured backend, retrying with exponential backoff until it answers.
pub async fn connect_with_backoff(settings: &StorageSettings) -> Arc<dyn BalanceStore> {
    let mut delay = INITIAL_DELAY;
    loop {
        match balance_store::connect(settings).await {
            Ok(store) => return store,
            Err(err) => {
                warn!(
                    backend = settings.backend.as_str(),
                    error = %err,
                    "storage connection attempt failed"
                );
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the active store and toggle degraded mode when it stops answering.
///
/// The store is looked up again on every round so a reload or migration is
/// picked up without restarting the supervisor.
pub async fn run(state: SharedState) {
    loop {
        let store = state.cache().await.store();
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if reconnect(&state, store.as_ref()).await {
                    state.update_degraded(false);
                } else {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                }
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn BalanceStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
