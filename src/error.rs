//! # Error Handling
//!
//! This module defines the errors the session control service can return and how
//! they're converted to HTTP responses.
//!
//! ## Error Categories:
//! - **Authentication**: missing (403) or wrong (401) `x-api-key` header
//! - **Protocol**: the body is not a JSON object (400)
//! - **Validation**: required fields missing or out of range (400)
//! - **Not found**: unknown session (404) or unknown endpoint (404)
//! - **Internal**: anything else (500)
//!
//! ## Response Format:
//! Every error body has the same three fields:
//! ```json
//! {
//!   "error": "Invalid request",
//!   "message": "Missing required field(s): quality",
//!   "code": "VALIDATION_ERROR"
//! }
//! ```

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the session control service.
///
/// ## Rust Concepts:
/// - **enum**: A type that can be one of several variants
/// - **Unit variants**: `MissingApiKey` carries no data because its message never changes
/// - **Tuple variants**: `Validation(String)` carries the human-readable reason
#[derive(Debug)]
pub enum AppError {
    /// The `x-api-key` header is absent or empty
    MissingApiKey,

    /// The `x-api-key` header does not match the configured key
    InvalidApiKey,

    /// The request body could not be parsed as a JSON object
    InvalidJson(String),

    /// A required field is missing or holds a value outside its allowed set
    Validation(String),

    /// The session identifier is not in the store
    SessionNotFound,

    /// No route matches the request's method and path
    EndpointNotFound(String),

    /// Server-side failures
    Internal(String),
}

impl AppError {
    /// Machine-readable code placed in the `code` field of the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingApiKey => "MISSING_API_KEY",
            AppError::InvalidApiKey => "INVALID_API_KEY",
            AppError::InvalidJson(_) => "INVALID_JSON",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::SessionNotFound => "SESSION_NOT_FOUND",
            AppError::EndpointNotFound(_) => "ENDPOINT_NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short title placed in the `error` field of the response body.
    fn title(&self) -> &'static str {
        match self {
            AppError::MissingApiKey => "Forbidden",
            AppError::InvalidApiKey => "Unauthorized",
            AppError::InvalidJson(_) | AppError::Validation(_) => "Invalid request",
            AppError::SessionNotFound => "Not found",
            AppError::EndpointNotFound(_) => "Not Found",
            AppError::Internal(_) => "Internal error",
        }
    }

    /// Message placed in the `message` field of the response body.
    ///
    /// `InvalidJson` keeps the parser detail for logs only; callers see a fixed message.
    fn public_message(&self) -> String {
        match self {
            AppError::MissingApiKey => "API key header missing".to_string(),
            AppError::InvalidApiKey => "Invalid API key".to_string(),
            AppError::InvalidJson(_) => "Invalid JSON in request body".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::SessionNotFound => "Session not found or already terminated".to_string(),
            AppError::EndpointNotFound(path) => format!("Endpoint not found: {}", path),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidJson(detail) => write!(f, "Invalid JSON: {}", detail),
            other => write!(f, "{}: {}", other.code(), other.public_message()),
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## HTTP Status Code Mapping:
/// - MissingApiKey → 403 (Forbidden)
/// - InvalidApiKey → 401 (Unauthorized)
/// - InvalidJson/Validation → 400 (Bad Request)
/// - SessionNotFound/EndpointNotFound → 404 (Not Found)
/// - Internal → 500 (Internal Server Error)
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingApiKey => StatusCode::FORBIDDEN,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::InvalidJson(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound | AppError::EndpointNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.title(),
            "message": self.public_message(),
            "code": self.code()
        }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// When you use `?` with an anyhow::Error inside a handler, it becomes an `AppError::Internal`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Automatic conversion from JSON parsing errors to AppError.
///
/// ## Why InvalidJson:
/// Parse failures on a request body are the client's fault and map to the
/// `INVALID_JSON` code rather than a 500.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidJson(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Internal(format!("Configuration error: {}", err))
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
