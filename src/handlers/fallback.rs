use crate::error::AppError;
use actix_web::{http::Method, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::debug;

/// Answers CORS preflights on any path and rejects everything else.
///
/// CORS headers themselves come from [`crate::middleware::cors_headers`].
pub async fn unmatched(req: HttpRequest) -> Result<HttpResponse, AppError> {
    if req.method() == Method::OPTIONS {
        debug!(path = %req.path(), "Answering CORS preflight");
        return Ok(HttpResponse::Ok().json(json!({})));
    }

    Err(AppError::EndpointNotFound(req.path().to_string()))
}
