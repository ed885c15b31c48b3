use std::{collections::HashMap, sync::Arc};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoBalanceDocument, doc_id},
};
use crate::dao::{
    balance_store::BalanceStore,
    models::BalanceEntity,
    storage::{StorageError, StorageResult},
};

const BALANCE_COLLECTION_NAME: &str = "balances";

#[derive(Clone)]
pub struct MongoBalanceStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoBalanceStore {
    /// Connect to MongoDB, retrying the initial ping.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;
        Ok(Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        })
    }

    async fn collection(&self) -> Collection<MongoBalanceDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoBalanceDocument>(BALANCE_COLLECTION_NAME)
    }

    async fn find_points(&self, id: Uuid) -> MongoResult<Option<i64>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadBalance { id, source })?;
        Ok(document.map(|doc| doc.points()))
    }

    async fn upsert_points(&self, batch: HashMap<Uuid, i64>) -> MongoResult<()> {
        let collection = self.collection().await;
        for (id, points) in batch {
            collection
                .update_one(doc_id(id), doc! { "$set": { "points": points } })
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SaveBalance { id, source })?;
        }
        Ok(())
    }

    async fn list_balances(&self) -> MongoResult<Vec<BalanceEntity>> {
        let collection = self.collection().await;
        let cursor = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListBalances { source })?;
        let documents: Vec<MongoBalanceDocument> = cursor
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListBalances { source })?;
        documents.into_iter().map(BalanceEntity::try_from).collect()
    }
}

impl BalanceStore for MongoBalanceStore {
    fn load_points(&self, identity: Uuid) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_points(identity)
                .await?
                .ok_or(StorageError::NotFound { identity })
        })
    }

    fn save_points(&self, batch: HashMap<Uuid, i64>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_points(batch).await.map_err(Into::into) })
    }

    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<BalanceEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_balances().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.reconnect().await.map_err(Into::into) })
    }

    fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let client = inner.state.read().await.client.clone();
            client.shutdown().await;
            Ok(())
        })
    }
}
