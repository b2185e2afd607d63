//! # Session Control Client
//!
//! A small `reqwest` client for `POST /session/start` and `DELETE /session/stop`, plus
//! the checks the `session_check` binary runs against a live server.
//!
//! ## Checks (in order):
//! 1. Valid start: 200 with a ws(s) `websocket_address` and a non-empty `session_token`
//! 2. Invalid API key: 401
//! 3. Missing API key: 401 or 403
//! 4. Stop the created session: 200 with only `status` and `message`
//! 5. Stop it again: 404
//! 6. Stop without an identifier: 400
//! 7. Stop with an unknown token: 404
//!
//! Error replies must carry `error` or `message`.

use crate::config::is_websocket_url;
use crate::handlers::API_KEY_HEADER;
use crate::middleware::mask_secret;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and parsed JSON body of one API call.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: StatusCode,
    /// `Value::Null` when the body was not JSON
    pub body: Value,
}

impl ApiReply {
    fn field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SessionClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: Some(api_key.to_string()),
        })
    }

    /// Same client, different credentials. `None` omits the header entirely.
    pub fn with_api_key(&self, api_key: Option<&str>) -> Self {
        Self {
            api_key: api_key.map(str::to_string),
            ..self.clone()
        }
    }

    pub async fn start(&self, payload: &Value) -> Result<ApiReply> {
        self.send(Method::POST, "/session/start", payload).await
    }

    pub async fn stop(&self, payload: &Value) -> Result<ApiReply> {
        self.send(Method::DELETE, "/session/stop", payload).await
    }

    async fn send(&self, method: Method, path: &str, payload: &Value) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let masked_key = self
            .api_key
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "<none>".to_string());
        info!(%method, %url, api_key = %masked_key, "Sending request");

        let mut request = self
            .http
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed, is the server running?", url))?;

        let status = response.status();
        let text = response.text().await.context("Failed to read response body")?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        debug!(%status, body = %text, "Received response");

        Ok(ApiReply { status, body })
    }
}

/// The body `session_check` sends to `POST /session/start`.
pub fn sample_start_payload(avatar_id: &str) -> Value {
    json!({
        "avatar_id": avatar_id,
        "quality": "high",
        "version": "v1",
        "video_encoding": "H264",
        "agora_settings": super::sample_agora_settings()
    })
}

/// Check a start reply and return its session token.
pub fn verify_start_response(reply: &ApiReply) -> Result<String> {
    if reply.status != StatusCode::OK {
        bail!("expected 200, got {}", reply.status);
    }

    let address = reply
        .field("websocket_address")
        .ok_or_else(|| anyhow!("missing websocket_address"))?;
    if !is_websocket_url(address) {
        bail!("websocket_address {} does not start with ws:// or wss://", address);
    }

    let token = reply
        .field("session_token")
        .ok_or_else(|| anyhow!("missing session_token"))?;
    if token.trim().is_empty() {
        bail!("session_token is empty");
    }

    Ok(token.to_string())
}

/// Check a stop reply: `status == "success"`, a message, and no echoed identifier.
pub fn verify_stop_response(reply: &ApiReply) -> Result<()> {
    if reply.status != StatusCode::OK {
        bail!("expected 200, got {}", reply.status);
    }

    match reply.field("status") {
        Some("success") => {}
        other => bail!("status is {:?}, expected \"success\"", other),
    }

    if reply.field("message").map_or(true, |m| m.trim().is_empty()) {
        bail!("message is missing or empty");
    }

    if let Some(object) = reply.body.as_object() {
        for key in ["session_id", "session_token"] {
            if object.contains_key(key) {
                bail!("reply echoes {}", key);
            }
        }
        let extra: Vec<&String> = object.keys().filter(|k| *k != "status" && *k != "message").collect();
        if !extra.is_empty() {
            warn!(fields = ?extra, "Unexpected fields in stop reply");
        }
    }

    Ok(())
}

/// Check an error reply against the accepted statuses.
pub fn verify_error_response(reply: &ApiReply, expected: &[StatusCode]) -> Result<()> {
    if !expected.contains(&reply.status) {
        bail!("expected one of {:?}, got {}", expected, reply.status);
    }

    if reply.field("error").is_none() && reply.field("message").is_none() {
        bail!("error reply has neither error nor message");
    }

    Ok(())
}

/// Outcome of one named check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub outcome: Result<(), String>,
}

impl CheckResult {
    fn record(name: &'static str, outcome: Result<()>) -> Self {
        match &outcome {
            Ok(()) => info!(check = name, "PASS"),
            Err(err) => warn!(check = name, "FAIL: {:#}", err),
        }
        Self {
            name,
            outcome: outcome.map_err(|err| format!("{:#}", err)),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run every check against the server behind `client`.
pub async fn run_session_checks(client: &SessionClient, avatar_id: &str) -> Vec<CheckResult> {
    let payload = sample_start_payload(avatar_id);
    let mut results = Vec::new();

    let started = client.start(&payload).await.and_then(|reply| verify_start_response(&reply));
    let token = started.as_ref().ok().cloned();
    results.push(CheckResult::record("start session", started.map(|_| ())));

    let invalid_key = client.with_api_key(Some("invalid_key_12345")).start(&payload).await;
    results.push(CheckResult::record(
        "invalid api key",
        invalid_key.and_then(|reply| verify_error_response(&reply, &[StatusCode::UNAUTHORIZED])),
    ));

    let missing_key = client.with_api_key(None).start(&payload).await;
    results.push(CheckResult::record(
        "missing api key",
        missing_key.and_then(|reply| {
            verify_error_response(&reply, &[StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN])
        }),
    ));

    match token {
        Some(token) => {
            let body = json!({ "session_token": token });

            let stopped = client.stop(&body).await;
            results.push(CheckResult::record(
                "stop session",
                stopped.and_then(|reply| verify_stop_response(&reply)),
            ));

            let again = client.stop(&body).await;
            results.push(CheckResult::record(
                "stop session twice",
                again.and_then(|reply| verify_error_response(&reply, &[StatusCode::NOT_FOUND])),
            ));
        }
        None => {
            results.push(CheckResult::record(
                "stop session",
                Err(anyhow!("skipped, no session was started")),
            ));
        }
    }

    let missing_id = client.stop(&json!({})).await;
    results.push(CheckResult::record(
        "stop without identifier",
        missing_id.and_then(|reply| verify_error_response(&reply, &[StatusCode::BAD_REQUEST])),
    ));

    let unknown = client.stop(&json!({ "session_token": "invalid_token_12345" })).await;
    results.push(CheckResult::record(
        "stop unknown token",
        unknown.and_then(|reply| verify_error_response(&reply, &[StatusCode::NOT_FOUND])),
    ));

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers;
    use crate::middleware;
    use crate::session::MockTokenIssuer;
    use crate::state::AppState;
    use actix_web::{web, App, HttpServer};
    use std::sync::Arc;

    fn reply(status: StatusCode, body: Value) -> ApiReply {
        ApiReply { status, body }
    }

    #[test]
    fn test_verify_start_response() {
        let ok = reply(
            StatusCode::OK,
            json!({"websocket_address": "wss://host/ws", "session_token": "abc"}),
        );
        assert_eq!(verify_start_response(&ok).unwrap(), "abc");

        let http = reply(
            StatusCode::OK,
            json!({"websocket_address": "http://host", "session_token": "abc"}),
        );
        assert!(verify_start_response(&http).is_err());

        let empty = reply(
            StatusCode::OK,
            json!({"websocket_address": "ws://host", "session_token": "  "}),
        );
        assert!(verify_start_response(&empty).is_err());
    }

    #[test]
    fn test_verify_stop_response() {
        let ok = reply(StatusCode::OK, json!({"status": "success", "message": "done"}));
        assert!(verify_stop_response(&ok).is_ok());

        let echoed = reply(
            StatusCode::OK,
            json!({"status": "success", "message": "done", "session_token": "t"}),
        );
        assert!(verify_stop_response(&echoed).is_err());

        let failed = reply(StatusCode::OK, json!({"status": "error", "message": "x"}));
        assert!(verify_stop_response(&failed).is_err());
    }

    #[test]
    fn test_verify_error_response() {
        let body = json!({"error": "Not found", "message": "Session not found", "code": "SESSION_NOT_FOUND"});
        assert!(verify_error_response(&reply(StatusCode::NOT_FOUND, body.clone()), &[StatusCode::NOT_FOUND]).is_ok());
        assert!(verify_error_response(&reply(StatusCode::OK, body), &[StatusCode::NOT_FOUND]).is_err());
        assert!(verify_error_response(&reply(StatusCode::NOT_FOUND, Value::Null), &[StatusCode::NOT_FOUND]).is_err());
    }

    #[actix_web::test]
    async fn test_checks_pass_against_live_server() {
        let config = AppConfig::default();
        let api_key = config.auth.api_key.clone();
        let state = AppState::new(config, Arc::new(MockTokenIssuer::new(60)));

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(middleware::cors_headers())
                .configure(handlers::configure)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        let client = SessionClient::new(&format!("http://{}", addr), &api_key).unwrap();
        let results = run_session_checks(&client, "16cb73e7de08").await;

        assert_eq!(results.len(), 7);
        for result in &results {
            assert!(result.passed(), "{} failed: {:?}", result.name, result.outcome);
        }

        handle.stop(true).await;
    }
}
