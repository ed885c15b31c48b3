use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted point balance of a single identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntity {
    /// Identity owning the balance.
    pub id: Uuid,
    /// Last persisted point total.
    pub points: i64,
}
