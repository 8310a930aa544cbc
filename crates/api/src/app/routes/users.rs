use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use classbook_auth::{Permission, UserPatch};
use classbook_core::UserId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

/// Account administration; every route needs `users.manage`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user).patch(update_user))
        .route("/:id/activate", post(activate_user))
        .route("/:id/deactivate", post(deactivate_user))
        .route("/:id/promote", post(promote_user))
        .route("/:id/demote", post(demote_user))
        .route("/:id/stats", get(user_stats))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    common::ok(services.accounts.get_user(principal.user_id()).await)
}

/// Name and email only; role and activation are administrative.
pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<UserPatch>,
) -> axum::response::Response {
    common::ok(services.accounts.update_user(principal.user_id(), body).await)
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> axum::response::Response {
    match services
        .accounts
        .change_password(principal.user_id(), &body.current_password, &body.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn my_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    common::ok(services.stats.user_stats(principal.user_id()).await)
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::UserListQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::USERS_MANAGE]) {
        return denied;
    }
    let page = match dto::page_request(query.skip, query.limit) {
        Ok(p) => p,
        Err(res) => return res,
    };
    common::ok(services.accounts.list_users(query.filter(), page).await)
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.accounts.get_user(id).await)
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<UserPatch>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.accounts.update_user(id, body).await)
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.accounts.activate_user(id).await)
}

/// Also cancels the account's active bookings on sessions still to come.
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.accounts.deactivate_user(id).await)
}

pub async fn promote_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.accounts.promote_to_admin(id).await)
}

pub async fn demote_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.accounts.demote_to_student(id).await)
}

pub async fn user_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match admin_target(&principal, &id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.stats.user_stats(id).await)
}

fn admin_target(principal: &PrincipalContext, raw: &str) -> Result<UserId, axum::response::Response> {
    authz::require(principal, &[Permission::USERS_MANAGE])?;
    errors::parse_id(raw, "user")
}
