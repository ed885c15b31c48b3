#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{StorageBackend, StorageSettings},
    dao::{
        models::BalanceEntity,
        storage::StorageResult,
    },
};

pub use memory::InMemoryBalanceStore;

/// Abstraction over the persistence layer holding point balances.
///
/// The cache only relies on [`load_points`](BalanceStore::load_points),
/// [`save_points`](BalanceStore::save_points) and [`close`](BalanceStore::close);
/// the remaining operations serve migration and health supervision.
pub trait BalanceStore: Send + Sync {
    /// Load one identity's balance. A backend may answer `Ok(0)` or
    /// [`StorageError::NotFound`] for an identity it has never seen.
    fn load_points(&self, identity: Uuid) -> BoxFuture<'static, StorageResult<i64>>;
    /// Persist a batch of balances. Any failure fails the whole batch.
    fn save_points(&self, batch: HashMap<Uuid, i64>) -> BoxFuture<'static, StorageResult<()>>;
    /// Read every stored balance.
    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<BalanceEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Release connections held by the backend.
    fn close(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Open the backend selected in `settings`.
pub async fn connect(settings: &StorageSettings) -> StorageResult<Arc<dyn BalanceStore>> {
    match settings.backend {
        StorageBackend::Memory => {
            info!("using in-memory balance store");
            Ok(Arc::new(InMemoryBalanceStore::new()))
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            let config = mongodb::MongoConfig::from_settings(&settings.mongo).await?;
            let store = mongodb::MongoBalanceStore::connect(config).await?;
            info!(database = %settings.mongo.database, "connected to MongoDB balance store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo-store"))]
        StorageBackend::Mongo => Err(crate::dao::storage::StorageError::Unsupported {
            backend: "mongo",
        }),
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            let config = couchdb::CouchConfig::from_settings(&settings.couch);
            let store = couchdb::CouchBalanceStore::connect(config).await?;
            info!(database = %settings.couch.database, "connected to CouchDB balance store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "couch-store"))]
        StorageBackend::Couch => Err(crate::dao::storage::StorageError::Unsupported {
            backend: "couch",
        }),
    }
}
