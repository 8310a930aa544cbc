//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the application services
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/query/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let services = Arc::new(services);
    let auth_state = middleware::AuthState {
        services: Arc::clone(&services),
    };

    // Protected routes: require a bearer token of an active account.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
