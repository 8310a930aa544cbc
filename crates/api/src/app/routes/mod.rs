use axum::{Router, routing::get};

pub mod auth;
pub mod bookings;
pub mod classes;
pub mod common;
pub mod sessions;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(users::me).patch(users::update_me))
        .route("/me/password", axum::routing::put(users::change_password))
        .route("/me/stats", get(users::my_stats))
        .route("/stats/system", get(system::system_stats))
        .nest("/classes", classes::router())
        .nest("/sessions", sessions::router())
        .nest("/bookings", bookings::router())
        .nest("/users", users::router())
}
