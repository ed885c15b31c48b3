use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::points::BalanceSummary;

/// Returned when an identity connects; its balance is loaded and cached.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionOpened {
    pub balance: BalanceSummary,
    /// `false` when the identity was already connected.
    pub newly_connected: bool,
}

/// Returned when an identity disconnects and its balance is evicted.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionClosed {
    pub identity: Uuid,
    /// Whether the identity was connected before the call.
    pub was_connected: bool,
}
