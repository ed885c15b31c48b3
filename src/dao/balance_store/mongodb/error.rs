use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to load balance `{id}`")]
    LoadBalance {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save balance `{id}`")]
    SaveBalance {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list balances")]
    ListBalances {
        #[source]
        source: MongoError,
    },
    #[error("stored balance has a malformed `_id` ({len} bytes)")]
    MalformedId { len: usize },
}
