use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::now_rfc3339, state::balance::TierChange};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a raw string payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when an identity moves to another tier.
pub struct TierChangedEvent {
    pub identity: Uuid,
    pub points: i64,
    /// `null` when the identity was below the first tier.
    pub from_index: Option<usize>,
    pub from_tier: String,
    pub to_index: Option<usize>,
    pub to_tier: String,
    /// RFC 3339 timestamp of the change.
    pub at: String,
}

impl From<&TierChange> for TierChangedEvent {
    fn from(change: &TierChange) -> Self {
        Self {
            identity: change.identity,
            points: change.points,
            from_index: change.from.index,
            from_tier: change.from.display_name.clone(),
            to_index: change.to.index,
            to_tier: change.to.display_name.clone(),
            at: now_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}
