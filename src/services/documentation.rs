use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the rank point service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::tier_stream,
        crate::routes::points::summary,
        crate::routes::points::give,
        crate::routes::points::take,
        crate::routes::points::set,
        crate::routes::points::reset,
        crate::routes::points::give_all,
        crate::routes::sessions::open,
        crate::routes::sessions::close,
        crate::routes::admin::reload,
        crate::routes::admin::migrate,
        crate::routes::admin::flush,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::points::BalanceSummary,
            crate::dto::points::PointsRequest,
            crate::dto::points::SetPointsRequest,
            crate::dto::points::GiveAllResponse,
            crate::dto::session::SessionOpened,
            crate::dto::session::SessionClosed,
            crate::dto::admin::ReloadResponse,
            crate::dto::admin::MigrateRequest,
            crate::dto::admin::MigrateResponse,
            crate::dto::admin::FlushResponse,
            crate::dto::sse::TierChangedEvent,
            crate::dto::sse::SystemStatus,
            crate::config::StorageBackend,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "points", description = "Balance lookups and point commands"),
        (name = "sessions", description = "Connect and disconnect hooks"),
        (name = "admin", description = "Configuration reload, storage migration and flush"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
