pub mod logging;

pub use logging::{mask_secret, RequestLogging};

use actix_web::middleware::DefaultHeaders;

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "POST, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, x-api-key, Authorization";

/// Permissive CORS headers added to every session-service response.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN))
        .add(("Access-Control-Allow-Methods", CORS_ALLOW_METHODS))
        .add(("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS))
}
