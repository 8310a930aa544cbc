use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use classbook_auth::Permission;
use classbook_core::SessionId;
use classbook_scheduling::{NewSession, SessionPatch};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/upcoming", get(upcoming_sessions))
        .route("/:id", get(get_session).patch(update_session))
        .route("/:id/cancel", post(cancel_session))
        .route("/:id/complete", post(complete_session))
        .route("/:id/attendance", get(session_attendance))
}

pub async fn create_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewSession>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_WRITE]) {
        return denied;
    }
    common::respond(StatusCode::CREATED, services.scheduler.create_session(body).await)
}

pub async fn list_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SessionListQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_READ]) {
        return denied;
    }
    let page = match dto::page_request(query.skip, query.limit) {
        Ok(p) => p,
        Err(res) => return res,
    };
    common::ok(services.scheduler.list_sessions(query.filter(), page).await)
}

pub async fn upcoming_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::UpcomingQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_READ]) {
        return denied;
    }
    let limit = query.limit.unwrap_or(dto::DEFAULT_UPCOMING_LIMIT);
    common::ok(services.scheduler.upcoming_sessions(limit).await)
}

pub async fn get_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_READ]) {
        return denied;
    }
    let id: SessionId = match errors::parse_id(&id, "session") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.scheduler.get_session(id).await)
}

pub async fn update_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SessionPatch>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_WRITE]) {
        return denied;
    }
    let id: SessionId = match errors::parse_id(&id, "session") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.scheduler.update_session(id, body).await)
}

/// Cancels the session and every active booking on it. The body is optional.
pub async fn cancel_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequest>>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_WRITE]) {
        return denied;
    }
    let id: SessionId = match errors::parse_id(&id, "session") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = body.unwrap_or_default();
    common::ok(services.scheduler.cancel_session(id, body.reason.as_deref()).await)
}

pub async fn complete_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_WRITE]) {
        return denied;
    }
    let id: SessionId = match errors::parse_id(&id, "session") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.scheduler.mark_completed(id).await)
}

pub async fn session_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::STATS_READ]) {
        return denied;
    }
    let id: SessionId = match errors::parse_id(&id, "session") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.stats.session_attendance(id).await)
}
