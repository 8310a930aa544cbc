use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};

use classbook_auth::{NewUser, UserRole};
use classbook_infra::ServiceResult;

use crate::app::dto::{self, TokenResponse};
use crate::app::routes::common;
use crate::app::services::AppServices;

/// Self-service sign-up. Always creates a student; admins are promoted.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(mut body): Json<NewUser>,
) -> axum::response::Response {
    body.role = UserRole::Student;
    common::respond(StatusCode::CREATED, services.accounts.register(body).await)
}

/// Exchange credentials for a bearer token.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let result: ServiceResult<TokenResponse> = async {
        let user = services.accounts.authenticate(&body.email, &body.password).await?;
        let access_token = services.accounts.issue_token(&user)?;
        Ok(TokenResponse {
            access_token,
            token_type: "bearer",
            expires_in: services.accounts.tokens().ttl().num_seconds(),
            user,
        })
    }
    .await;
    common::ok(result)
}
