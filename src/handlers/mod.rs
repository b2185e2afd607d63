pub mod fallback;
pub mod session;

pub use fallback::unmatched;
pub use session::{start_session, stop_session};

use actix_web::web;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Register the session control routes.
///
/// Each resource falls back to [`unmatched`] so that a wrong method on a known path
/// answers like an unknown path (404 `ENDPOINT_NOT_FOUND`, or 200 for `OPTIONS`)
/// rather than actix's default 405.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/session/start")
            .route(web::post().to(start_session))
            .default_service(web::to(unmatched)),
    )
    .service(
        web::resource("/session/stop")
            .route(web::delete().to(stop_session))
            .default_service(web::to(unmatched)),
    )
    .default_service(web::to(unmatched));
}
