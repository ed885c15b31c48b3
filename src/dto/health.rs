use serde::Serialize;
use utoipa::ToSchema;

use crate::config::StorageBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    /// The balance store stopped answering; commands may fail until it recovers.
    Degraded,
}

/// Body of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Backend currently holding the balances.
    pub backend: StorageBackend,
    /// Identities with an open session.
    pub connected: usize,
    /// Balances resident in the cache.
    pub loaded: usize,
}
