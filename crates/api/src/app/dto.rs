use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_auth::{User, UserRole};
use classbook_booking::BookingStatus;
use classbook_classes::{ClassCategory, ClassStatus};
use classbook_core::{ClassId, PageRequest, SessionId, UserId};
use classbook_infra::store::{BookingFilter, ClassFilter, SessionFilter, UserFilter};
use classbook_scheduling::SessionStatus;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub session_id: SessionId,
    pub notes: Option<String>,
    /// Book on behalf of another user; requires `bookings.manage`.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attended: bool,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassListQuery {
    pub status: Option<ClassStatus>,
    pub category: Option<ClassCategory>,
    pub search: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionListQuery {
    pub class_id: Option<ClassId>,
    pub status: Option<SessionStatus>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncludePastQuery {
    #[serde(default)]
    pub include_past: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyBookingsQuery {
    pub status: Option<BookingStatus>,
    #[serde(default = "default_true")]
    pub include_past: bool,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub user_id: Option<UserId>,
    pub status: Option<BookingStatus>,
    pub class_id: Option<ClassId>,
    #[serde(default)]
    pub active_only: bool,
    pub session_start_from: Option<DateTime<Utc>>,
    pub session_start_to: Option<DateTime<Utc>>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

fn default_true() -> bool {
    true
}

pub const DEFAULT_UPCOMING_LIMIT: u64 = 20;

/// `skip`/`limit` query parameters as a page request; `limit=0` is a `400`.
pub fn page_request(skip: Option<u64>, limit: Option<u64>) -> Result<PageRequest, Response> {
    PageRequest::new(
        skip.unwrap_or(0),
        limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
    )
    .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))
}

impl ClassListQuery {
    pub fn filter(&self) -> ClassFilter {
        ClassFilter {
            status: self.status,
            category: self.category,
            search: self.search.clone(),
        }
    }
}

impl SessionListQuery {
    pub fn filter(&self) -> SessionFilter {
        SessionFilter {
            class_id: self.class_id,
            status: self.status,
            start_from: self.start_from,
            start_to: self.start_to,
            starts_after: None,
        }
    }
}

impl BookingListQuery {
    pub fn filter(&self) -> BookingFilter {
        BookingFilter {
            user_id: self.user_id,
            status: self.status,
            active_only: self.active_only,
            class_id: self.class_id,
            session_start_from: self.session_start_from,
            session_start_to: self.session_start_to,
            session_starts_after: None,
        }
    }
}

impl UserListQuery {
    pub fn filter(&self) -> UserFilter {
        UserFilter {
            role: self.role,
            is_active: self.is_active,
            search: self.search.clone(),
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ConflictResponse {
    pub session_id: SessionId,
    pub has_conflict: bool,
}
