use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;

use classbook_infra::ServiceResult;

use crate::app::errors;

/// Serialize a service result with `status`, or map its error.
pub fn respond<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `200 OK` shorthand for [`respond`].
pub fn ok<T: Serialize>(result: ServiceResult<T>) -> Response {
    respond(StatusCode::OK, result)
}
