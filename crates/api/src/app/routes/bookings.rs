//! Booking endpoints.
//!
//! Students act as themselves, so the booking engine enforces ownership and
//! the owner-only cancellation cutoff. Administrators act without an acting
//! user and bypass both.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use classbook_auth::Permission;
use classbook_booking::BookingPatch;
use classbook_core::{BookingId, SessionId};
use classbook_infra::store::BookingStatusFilter;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/mine", get(my_bookings))
        .route("/mine/upcoming", get(my_upcoming_bookings))
        .route("/stats", get(booking_stats))
        .route("/conflicts/:session_id", get(check_conflict))
        .route("/:id", get(get_booking).patch(update_booking))
        .route("/:id/cancel", post(cancel_booking))
        .route("/:id/confirm", post(confirm_booking))
        .route("/:id/attendance", post(mark_attendance))
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateBookingRequest>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_CREATE]) {
        return denied;
    }
    let user_id = match body.user_id {
        Some(other) if other != principal.user_id() => {
            if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_MANAGE]) {
                return denied;
            }
            other
        }
        _ => principal.user_id(),
    };
    common::respond(
        StatusCode::CREATED,
        services
            .engine
            .create_booking(body.session_id, user_id, body.notes)
            .await,
    )
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::BookingListQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_MANAGE]) {
        return denied;
    }
    let page = match dto::page_request(query.skip, query.limit) {
        Ok(p) => p,
        Err(res) => return res,
    };
    common::ok(services.engine.list_all_bookings(query.filter(), page).await)
}

pub async fn my_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::MyBookingsQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_READ_OWN]) {
        return denied;
    }
    let page = match dto::page_request(query.skip, query.limit) {
        Ok(p) => p,
        Err(res) => return res,
    };
    common::ok(
        services
            .engine
            .list_user_bookings(principal.user_id(), query.status, query.include_past, page)
            .await,
    )
}

pub async fn my_upcoming_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::UpcomingQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_READ_OWN]) {
        return denied;
    }
    let limit = query.limit.unwrap_or(dto::DEFAULT_UPCOMING_LIMIT);
    common::ok(services.engine.upcoming_for_user(principal.user_id(), limit).await)
}

pub async fn booking_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::StatsQuery>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::STATS_READ]) {
        return denied;
    }
    let filter = BookingStatusFilter {
        user_id: None,
        booked_from: query.from,
        booked_to: query.to,
    };
    common::ok(services.engine.compute_stats(filter).await)
}

/// Whether the caller already holds a booking overlapping the session.
pub async fn check_conflict(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(session_id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_READ_OWN]) {
        return denied;
    }
    let session_id: SessionId = match errors::parse_id(&session_id, "session") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let result = services
        .engine
        .check_conflict(principal.user_id(), session_id)
        .await
        .map(|has_conflict| dto::ConflictResponse {
            session_id,
            has_conflict,
        });
    common::ok(result)
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_READ_OWN]) {
        return denied;
    }
    let id: BookingId = match errors::parse_id(&id, "booking") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.engine.get_booking(id, principal.acting_user()).await)
}

/// Owners may edit their notes; status and admin notes need `bookings.manage`.
pub async fn update_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<BookingPatch>,
) -> axum::response::Response {
    let mut required = vec![Permission::BOOKINGS_UPDATE_OWN];
    if body.status.is_some() || body.admin_notes.is_some() {
        required.push(Permission::BOOKINGS_MANAGE);
    }
    if let Err(denied) = authz::require(&principal, &required) {
        return denied;
    }
    let id: BookingId = match errors::parse_id(&id, "booking") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(
        services
            .engine
            .update_booking(id, body, principal.acting_user())
            .await,
    )
}

pub async fn cancel_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequest>>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_UPDATE_OWN]) {
        return denied;
    }
    let id: BookingId = match errors::parse_id(&id, "booking") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Json(body) = body.unwrap_or_default();
    common::ok(
        services
            .engine
            .cancel_booking(id, principal.acting_user(), body.reason.as_deref())
            .await,
    )
}

pub async fn confirm_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_MANAGE]) {
        return denied;
    }
    let id: BookingId = match errors::parse_id(&id, "booking") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.engine.confirm_booking(id).await)
}

pub async fn mark_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AttendanceRequest>,
) -> axum::response::Response {
    if let Err(denied) = authz::require(&principal, &[Permission::BOOKINGS_MANAGE]) {
        return denied;
    }
    let id: BookingId = match errors::parse_id(&id, "booking") {
        Ok(v) => v,
        Err(res) => return res,
    };
    common::ok(services.engine.mark_attendance(id, body.attended).await)
}
