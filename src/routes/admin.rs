use axum::{Json, Router, extract::State, middleware, routing::post};

use crate::{
    dto::admin::{FlushResponse, MigrateRequest, MigrateResponse, ReloadResponse},
    error::AppError,
    routes::auth::require_admin_token,
    services::admin_service,
    state::SharedState,
};

/// Admin-only maintenance endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/reload", post(reload))
        .route("/admin/migrate", post(migrate))
        .route("/admin/flush", post(flush))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

#[utoipa::path(
    post,
    path = "/admin/reload",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses((status = 200, description = "Configuration reloaded", body = ReloadResponse))
)]
/// Re-read the configuration file and apply the new tiers and storage settings.
pub async fn reload(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, AppError> {
    Ok(Json(admin_service::reload(&state).await?))
}

#[utoipa::path(
    post,
    path = "/admin/migrate",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    request_body = MigrateRequest,
    responses((status = 200, description = "Balances copied and backend switched", body = MigrateResponse))
)]
/// Copy all balances to another backend and switch to it.
pub async fn migrate(
    State(state): State<SharedState>,
    Json(payload): Json<MigrateRequest>,
) -> Result<Json<MigrateResponse>, AppError> {
    Ok(Json(admin_service::migrate(&state, payload.target).await?))
}

#[utoipa::path(
    post,
    path = "/admin/flush",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses((status = 200, description = "Dirty balances saved", body = FlushResponse))
)]
/// Persist every dirty balance now.
pub async fn flush(State(state): State<SharedState>) -> Result<Json<FlushResponse>, AppError> {
    Ok(Json(admin_service::flush(&state).await?))
}
