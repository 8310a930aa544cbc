use core::str::FromStr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use classbook_core::DomainError;
use classbook_infra::ServiceError;
use classbook_infra::store::StoreError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::Domain(e) => domain_status(e),
        ServiceError::Store(StoreError::SerializationConflict(_))
        | ServiceError::Store(StoreError::UniqueViolation(_)) => StatusCode::CONFLICT,
        ServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Store(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match &err {
        // Infrastructure detail stays in the logs.
        ServiceError::Store(_) | ServiceError::Internal(_) => "internal error".to_string(),
        ServiceError::Domain(e) => e.to_string(),
    };
    json_error(status, err.code(), message)
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::InvalidId(_)
        | DomainError::InvalidRange
        | DomainError::NotBookable(_)
        | DomainError::PastSession
        | DomainError::DeadlinePassed(_)
        | DomainError::InvalidTransition(_)
        | DomainError::TooEarly => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::SchedulingConflict(_)
        | DomainError::CapacityExceeded { .. }
        | DomainError::DuplicateBooking => StatusCode::CONFLICT,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path identifier, answering `400 invalid_id` on failure.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_refusals_map_to_client_statuses() {
        let cases = [
            (DomainError::CapacityExceeded { capacity: 3 }, StatusCode::CONFLICT),
            (DomainError::DuplicateBooking, StatusCode::CONFLICT),
            (DomainError::DeadlinePassed("booking"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("session", "x"), StatusCode::NOT_FOUND),
            (DomainError::forbidden("not yours"), StatusCode::FORBIDDEN),
            (DomainError::AuthenticationFailed, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err.into()).status(), status);
        }
    }

    #[test]
    fn store_failures_hide_details() {
        let res = service_error_to_response(StoreError::Unavailable("pool timed out".into()).into());
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let res = service_error_to_response(ServiceError::Internal("argon2".into()));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id::<classbook_core::SessionId>("not-a-uuid", "session").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
