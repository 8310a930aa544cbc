use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use classbook_auth::Permission;
use classbook_classes::{ClassPatch, NewClass};
use classbook_core::ClassId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_class).get(list_classes))
        .route("/:id", get(get_class).patch(update_class))
        .route("/:id/archive", post(archive_class))
        .route("/:id/sessions", get(class_sessions))
}

pub async fn create_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewClass>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::CLASSES_WRITE]) {
        return denied;
    }
    common::respond(StatusCode::CREATED, services.catalog.create_class(body).await)
}

pub async fn list_classes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ClassListQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::CLASSES_READ]) {
        return denied;
    }
    let page = match dto::page_request(query.skip, query.limit) {
        Ok(p) => p,
        Err(res) => return res,
    };
    common::ok(services.catalog.list_classes(query.filter(), page).await)
}

pub async fn get_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::CLASSES_READ]) {
        return denied;
    }
    let id: ClassId = match errors::parse_id(&id, "class") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.catalog.get_class(id).await)
}

pub async fn update_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ClassPatch>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::CLASSES_WRITE]) {
        return denied;
    }
    let id: ClassId = match errors::parse_id(&id, "class") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.catalog.update_class(id, body).await)
}

pub async fn archive_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::CLASSES_WRITE]) {
        return denied;
    }
    let id: ClassId = match errors::parse_id(&id, "class") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.catalog.archive_class(id).await)
}

pub async fn class_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::IncludePastQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::SESSIONS_READ]) {
        return denied;
    }
    let id: ClassId = match errors::parse_id(&id, "class") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.scheduler.sessions_for_class(id, query.include_past).await)
}
