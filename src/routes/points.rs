use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::points::{BalanceSummary, GiveAllResponse, PointsRequest, SetPointsRequest},
    error::AppError,
    routes::auth::require_admin_token,
    services::points_service,
    state::SharedState,
};

/// Balance lookups are public; every mutation sits behind the admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    let mutations = Router::new()
        .route("/points/give-all", post(give_all))
        .route("/points/{id}/give", post(give))
        .route("/points/{id}/take", post(take))
        .route("/points/{id}/set", post(set))
        .route("/points/{id}/reset", post(reset))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    Router::new()
        .route("/points/{id}", get(summary))
        .merge(mutations)
}

#[utoipa::path(
    get,
    path = "/points/{id}",
    tag = "points",
    params(("id" = Uuid, Path, description = "Identity whose balance is requested")),
    responses((status = 200, description = "Balance and tier", body = BalanceSummary))
)]
/// Return the balance and tier of an identity.
pub async fn summary(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceSummary>, AppError> {
    Ok(Json(points_service::summary(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/points/{id}/give",
    tag = "points",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = Uuid, Path, description = "Identity receiving the points")),
    request_body = PointsRequest,
    responses((status = 200, description = "Updated balance", body = BalanceSummary))
)]
/// Add points to a balance.
pub async fn give(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PointsRequest>>,
) -> Result<Json<BalanceSummary>, AppError> {
    Ok(Json(points_service::give(&state, id, payload.points).await?))
}

#[utoipa::path(
    post,
    path = "/points/{id}/take",
    tag = "points",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = Uuid, Path, description = "Identity losing the points")),
    request_body = PointsRequest,
    responses((status = 200, description = "Updated balance, floored at zero", body = BalanceSummary))
)]
/// Remove points from a balance; never goes below zero.
pub async fn take(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PointsRequest>>,
) -> Result<Json<BalanceSummary>, AppError> {
    Ok(Json(points_service::take(&state, id, payload.points).await?))
}

#[utoipa::path(
    post,
    path = "/points/{id}/set",
    tag = "points",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = Uuid, Path, description = "Identity whose balance is overwritten")),
    request_body = SetPointsRequest,
    responses((status = 200, description = "Updated balance", body = BalanceSummary))
)]
/// Overwrite a balance with an absolute value.
pub async fn set(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SetPointsRequest>>,
) -> Result<Json<BalanceSummary>, AppError> {
    Ok(Json(points_service::set(&state, id, payload.points).await?))
}

#[utoipa::path(
    post,
    path = "/points/{id}/reset",
    tag = "points",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = Uuid, Path, description = "Identity whose balance is reset")),
    responses((status = 200, description = "Balance reset to zero", body = BalanceSummary))
)]
/// Reset a balance to zero.
pub async fn reset(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceSummary>, AppError> {
    Ok(Json(points_service::reset(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/points/give-all",
    tag = "points",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    request_body = PointsRequest,
    responses((status = 200, description = "Points given to every connected identity", body = GiveAllResponse))
)]
/// Give points to every connected identity.
pub async fn give_all(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PointsRequest>>,
) -> Result<Json<GiveAllResponse>, AppError> {
    Ok(Json(points_service::give_all(&state, payload.points).await?))
}
