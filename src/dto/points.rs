//! DTO definitions for balance queries and point commands.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::balance::Balance;

/// Current state of one identity's balance, as shown by `/points/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BalanceSummary {
    pub identity: Uuid,
    pub points: i64,
    /// Points with thousands separators.
    pub pretty_points: String,
    /// `null` below the first tier.
    pub tier_index: Option<usize>,
    pub tier: String,
    /// Permission group granted by the tier.
    pub group: Option<String>,
    /// Size of the current tier, or the configured max label.
    pub total_points: String,
    /// Points left before the next tier, or the configured max label.
    pub need_points: String,
}

impl From<&Balance> for BalanceSummary {
    fn from(balance: &Balance) -> Self {
        Self {
            identity: balance.identity(),
            points: balance.points(),
            pretty_points: balance.pretty_points().to_string(),
            tier_index: balance.tier_index(),
            tier: balance.tier_name().to_string(),
            group: balance.tier_group().map(str::to_string),
            total_points: balance.total_points_label().to_string(),
            need_points: balance.need_points_label().to_string(),
        }
    }
}

/// Positive amount to give or take.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PointsRequest {
    #[validate(range(min = 1, message = "points must be a positive integer"))]
    pub points: i64,
}

/// Absolute value to assign; zero is allowed.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetPointsRequest {
    #[validate(range(min = 0, message = "points cannot be negative"))]
    pub points: i64,
}

/// Outcome of `/points/give-all`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GiveAllResponse {
    pub points: i64,
    /// Connected identities that received the points.
    pub updated: Vec<Uuid>,
    /// Connected identities whose balance could not be loaded.
    pub failed: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_must_be_positive() {
        assert!(PointsRequest { points: 1 }.validate().is_ok());
        assert!(PointsRequest { points: 0 }.validate().is_err());
        assert!(PointsRequest { points: -3 }.validate().is_err());
        assert!(SetPointsRequest { points: 0 }.validate().is_ok());
        assert!(SetPointsRequest { points: -1 }.validate().is_err());
    }
}
