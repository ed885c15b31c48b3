use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde_json::from_value;
use uuid::Uuid;

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsKeys, AllDocsResponse, BALANCE_PREFIX, BulkDocsRequest, BulkDocsResult,
        CouchBalanceDocument, END_SUFFIX, balance_doc_id,
    },
};
use crate::dao::{balance_store::BalanceStore, models::BalanceEntity, storage::StorageResult};

const ALL_DOCS: &str = "_all_docs";
const BULK_DOCS: &str = "_bulk_docs";

#[derive(Clone)]
pub struct CouchBalanceStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchBalanceStore {
    /// Build the HTTP client and make sure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn database_status(&self) -> CouchResult<StatusCode> {
        let response = self
            .authorize(self.client.get(self.database_url()))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: self.database.to_string(),
                source,
            })?;
        Ok(response.status())
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        match self.database_status().await? {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(self.database_url()))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn fetch_points(&self, identity: Uuid) -> CouchResult<i64> {
        let doc_id = balance_doc_id(identity);
        let response = self
            .request(Method::GET, &doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(0),
            status if status.is_success() => response
                .json::<CouchBalanceDocument>()
                .await
                .map(|doc| doc.points)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id,
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id,
                status: other,
            }),
        }
    }

    /// Current revision of each existing, non-deleted document.
    async fn current_revisions(&self, doc_ids: &[String]) -> CouchResult<HashMap<String, String>> {
        let response = self
            .request(Method::POST, ALL_DOCS)
            .json(&AllDocsKeys { keys: doc_ids })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        Ok(payload
            .rows
            .into_iter()
            .filter(|row| row.error.is_none())
            .filter_map(|row| match row.value {
                Some(value) if !value.deleted => Some((row.key, value.rev)),
                _ => None,
            })
            .collect())
    }

    async fn bulk_save(&self, batch: HashMap<Uuid, i64>) -> CouchResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let doc_ids: Vec<String> = batch.keys().map(|id| balance_doc_id(*id)).collect();
        let mut revisions = self.current_revisions(&doc_ids).await?;

        let docs = batch
            .into_iter()
            .map(|(identity, points)| {
                let rev = revisions.remove(&balance_doc_id(identity));
                CouchBalanceDocument::new(identity, points, rev)
            })
            .collect();

        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            });
        }

        let results = response
            .json::<Vec<BulkDocsResult>>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        let failed: Vec<String> = results
            .into_iter()
            .filter_map(|result| {
                result.error.map(|error| match result.reason {
                    Some(reason) => format!("{} ({error}: {reason})", result.id),
                    None => format!("{} ({error})", result.id),
                })
            })
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CouchDaoError::BulkRejected { failed })
        }
    }

    async fn list_balances(&self) -> CouchResult<Vec<BalanceEntity>> {
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{BALANCE_PREFIX}\"")),
            ("endkey", format!("\"{BALANCE_PREFIX}{END_SUFFIX}\"")),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut balances = Vec::with_capacity(payload.rows.len());
        for doc in payload.rows.into_iter().filter_map(|row| row.doc) {
            let parsed: CouchBalanceDocument =
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
            balances.push(parsed.try_into_entity()?);
        }
        Ok(balances)
    }
}

impl BalanceStore for CouchBalanceStore {
    fn load_points(&self, identity: Uuid) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_points(identity).await.map_err(Into::into) })
    }

    fn save_points(&self, batch: HashMap<Uuid, i64>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.bulk_save(batch).await.map_err(Into::into) })
    }

    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<BalanceEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_balances().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            match store.database_status().await? {
                status if status.is_success() => Ok(()),
                status => Err(CouchDaoError::DatabaseStatus {
                    database: store.database.to_string(),
                    status,
                }
                .into()),
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }

    fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
