//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::StorageBackend;

/// Result of `/admin/reload`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    pub tiers: usize,
    pub backend: StorageBackend,
    /// Whether a new store connection was opened.
    pub store_replaced: bool,
    /// Connected identities whose balance load was started again.
    pub warmed: usize,
}

/// Request to move every balance to another backend.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MigrateRequest {
    pub target: StorageBackend,
}

/// Result of `/admin/migrate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MigrateResponse {
    pub from: StorageBackend,
    pub to: StorageBackend,
    /// Number of balances copied.
    pub copied: usize,
    pub warmed: usize,
}

/// Result of `/admin/flush`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FlushResponse {
    pub saved: usize,
}
