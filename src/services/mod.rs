/// Admin operations: reload, migration and on-demand flush.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Periodic background flush of dirty balances.
pub mod flush_scheduler;
/// Health check service.
pub mod health_service;
/// Balance copy between storage backends.
pub mod migration;
/// Point commands on individual balances.
pub mod points_service;
/// Connect and disconnect hooks.
pub mod session_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage health polling and degraded-mode toggling.
pub mod storage_supervisor;
