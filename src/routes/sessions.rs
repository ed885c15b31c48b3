use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::session::{SessionClosed, SessionOpened},
    error::AppError,
    routes::auth::require_admin_token,
    services::session_service,
    state::SharedState,
};

/// Connect/disconnect hooks called by the game server.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}", post(open).delete(close))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = Uuid, Path, description = "Identity that connected")),
    responses((status = 200, description = "Balance loaded and cached", body = SessionOpened))
)]
/// Mark an identity connected and cache its balance.
pub async fn open(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionOpened>, AppError> {
    Ok(Json(session_service::open(&state, id).await?))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = Uuid, Path, description = "Identity that disconnected")),
    responses((status = 200, description = "Balance persisted and evicted", body = SessionClosed))
)]
/// Mark an identity disconnected, then persist and evict its balance.
pub async fn close(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionClosed>, AppError> {
    Ok(Json(session_service::close(&state, id).await?))
}
