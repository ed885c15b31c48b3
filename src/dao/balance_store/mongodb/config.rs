use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};
use crate::config::MongoSettings;

/// Parsed client options plus the database holding the `balances` collection.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    pub connect_attempts: u32,
}

impl MongoConfig {
    pub async fn from_settings(settings: &MongoSettings) -> MongoResult<Self> {
        let options = ClientOptions::parse(&settings.uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: settings.uri.clone(),
                source,
            })?;

        Ok(Self {
            options,
            database_name: settings.database.clone(),
            connect_attempts: settings.connect_attempts.max(1),
        })
    }
}
