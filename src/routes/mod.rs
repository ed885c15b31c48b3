use axum::Router;

use crate::state::SharedState;

pub mod admin;
mod auth;
pub mod docs;
pub mod health;
pub mod points;
pub mod sessions;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(points::router(state.clone()))
        .merge(sessions::router(state.clone()))
        .merge(admin::router(state.clone()))
        .merge(docs::router());

    api_router.with_state(state)
}
