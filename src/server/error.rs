//! HTTP error responses.
//!
//! Every failure leaves the server as a status code plus `{"error": "..."}`.
//! Internal details are logged here and replaced with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::types::ErrorResponse;
use crate::identity::IdentityError;
use crate::notifications::DispatchError;
use crate::store::StoreError;

/// Status code plus client-facing message.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Goes out as `{"error": message}`.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// 400 Bad Request.
pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// 401 Unauthorized.
pub fn unauthorized(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        message: message.into(),
    }
}

/// 404 Not Found.
pub fn not_found(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

/// 409 Conflict.
pub fn conflict(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::CONFLICT,
        message: message.into(),
    }
}

/// 500 with a generic message; `detail` only goes to the log.
pub fn internal(message: &str, detail: &dyn std::fmt::Display) -> ApiError {
    log::error!("[Server] {message}: {detail}");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        log::debug!("[Server] Rejected request body: {rejection}");
        bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        internal("Error saving subscription", &err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidRequest(detail) => bad_request(detail),
            DispatchError::NoSubscribers => {
                not_found("No subscriptions found for the provided students")
            }
            DispatchError::Storage(e) => {
                internal("An error occurred while sending notifications", &e)
            }
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidRequest => bad_request("All fields are required"),
            IdentityError::AlreadyRegistered => conflict("Student is already registered"),
            IdentityError::InvalidCredentials => unauthorized("Invalid credentials"),
            IdentityError::Storage(_) => internal("Error registering student", &err),
            IdentityError::Token(_) => internal("Error issuing token", &err),
        }
    }
}
