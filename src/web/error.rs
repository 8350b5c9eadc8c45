//! API errors and their JSON rendering.
//!
//! Every failure leaves the server as
//! `{"error": {"code": "...", "message": "...", "details": {...}}}`, with
//! `details` present only for field-level validation failures.

use std::collections::HashMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::DropgateError;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    /// The file expired by time or by download count.
    Gone,
    /// Field-level validation failed; see `details`.
    ValidationError,
    UnprocessableEntity,
    TooManyRequests,
    InternalError,
}

impl ErrorCode {
    /// HTTP status sent with this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Gone => StatusCode::GONE,
            ErrorCode::ValidationError | ErrorCode::UnprocessableEntity => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

type FieldErrors = HashMap<String, Vec<String>>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a FieldErrors>,
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<FieldErrors>,
}

macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCode::$code, message)
            }
        )*
    };
}

impl ApiError {
    /// Error with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    constructors! {
        /// 400.
        bad_request => BadRequest;
        /// 401.
        unauthorized => Unauthorized;
        /// 403.
        forbidden => Forbidden;
        /// 404.
        not_found => NotFound;
        /// 409.
        conflict => Conflict;
        /// 410.
        gone => Gone;
        /// 422 without field details.
        unprocessable => UnprocessableEntity;
        /// 429.
        too_many_requests => TooManyRequests;
        /// 500. Keep the message generic.
        internal => InternalError;
    }

    /// 422 with per-field messages.
    pub fn validation(details: FieldErrors) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }

    /// 422 built from `validator` output.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(m) => m.to_string(),
                        None => format!("Invalid value for {field}"),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::validation(details)
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
                details: self.details.as_ref(),
            },
        };
        (self.code.status_code(), Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DropgateError> for ApiError {
    fn from(err: DropgateError) -> Self {
        match err {
            DropgateError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            DropgateError::Gone(msg) => ApiError::gone(msg),
            DropgateError::Permission(msg) => ApiError::forbidden(msg),
            DropgateError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            DropgateError::Conflict(msg) => ApiError::conflict(msg),
            DropgateError::Validation(msg) => ApiError::unprocessable(msg),
            other => {
                tracing::error!(error = %other, "Internal error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}
