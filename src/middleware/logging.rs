use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{error, info, warn};

use crate::handlers::API_KEY_HEADER;

/// Logs every request with the API key masked and the outcome's status.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let api_key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(mask_secret)
            .unwrap_or_else(|| "<none>".to_string());

        info!(
            method = %method,
            path = %path,
            remote_addr = %remote_addr,
            api_key = %api_key,
            "Request started"
        );

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis();

            match &result {
                Ok(response) if response.status().is_success() => {
                    info!(
                        method = %method,
                        path = %path,
                        status = response.status().as_u16(),
                        duration_ms = %duration_ms,
                        "Request completed"
                    );
                }
                Ok(response) => {
                    warn!(
                        method = %method,
                        path = %path,
                        status = response.status().as_u16(),
                        duration_ms = %duration_ms,
                        "Request rejected"
                    );
                }
                Err(err) => {
                    error!(
                        method = %method,
                        path = %path,
                        duration_ms = %duration_ms,
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}

/// Keep the first four characters of a secret and hide the rest.
///
/// `Bearer <token>` values keep their scheme so logs still show what kind of
/// credential was presented.
pub fn mask_secret(secret: &str) -> String {
    let (scheme, value) = match secret.split_once(' ') {
        Some((scheme, value)) if scheme.eq_ignore_ascii_case("bearer") => {
            (format!("{} ", scheme), value)
        }
        _ => (String::new(), secret),
    };

    if value.chars().count() <= 4 {
        return format!("{}***", scheme);
    }

    let head: String = value.chars().take(4).collect();
    format!("{}{}***", scheme, head)
}
