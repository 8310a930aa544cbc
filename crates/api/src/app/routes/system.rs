use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde_json::json;

use classbook_auth::Permission;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

/// `200` when a store transaction round-trips, `503` otherwise.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    if services.store_healthy().await {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "timestamp": services.now() })),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy" })),
        )
            .into_response()
    }
}

pub async fn system_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::STATS_READ]) {
        return denied;
    }
    common::ok(services.stats.system_stats().await)
}
