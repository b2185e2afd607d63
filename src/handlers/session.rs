//! Session start/stop handlers.
//!
//! Both endpoints run the same prelude: check the `x-api-key` header, then parse the
//! body as a JSON object. Bodies are read as raw bytes so that parse failures map to
//! the service's own `INVALID_JSON` error instead of actix's default JSON rejection.

use crate::error::{AppError, AppResult};
use crate::handlers::API_KEY_HEADER;
use crate::session::models::{
    SessionKey, StartSessionRequest, StartSessionResponse, StopSessionRequest,
    StopSessionResponse,
};
use crate::session::schema;
use crate::session::SessionMetadata;
use crate::state::AppState;

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Check the `x-api-key` header against the configured key.
///
/// An empty header value counts as missing.
pub fn authorize(req: &HttpRequest, expected: &str) -> AppResult<()> {
    let header = match req.headers().get(API_KEY_HEADER) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AppError::MissingApiKey),
    };

    match header.to_str() {
        Ok(key) if key == expected => Ok(()),
        _ => Err(AppError::InvalidApiKey),
    }
}

/// Parse a request body as a JSON object; an empty body is treated as `{}`.
pub fn parse_object(body: &[u8]) -> AppResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::InvalidJson(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `POST /session/start`
pub async fn start_session(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    info!("Handling session start request");

    authorize(&req, state.api_key())?;
    let body = parse_object(&body)?;
    let payload = serde_json::Value::Object(body.clone());
    debug!(request = %payload, "Session start payload");

    schema::validate_start(&body).map_err(AppError::Validation)?;
    let request: StartSessionRequest = serde_json::from_value(payload)
        .map_err(|e| AppError::Validation(format!("Invalid field type: {}", e)))?;

    let token = state.tokens.issue();
    let session_id = state.sessions.create(SessionMetadata {
        avatar_id: request.avatar_id.to_text(),
        quality: request.quality,
        token: token.clone(),
    });

    info!(
        session_id = %session_id,
        token = %token.preview(),
        avatar_id = %request.avatar_id,
        quality = %request.quality,
        active_sessions = state.sessions.len(),
        "Created new session"
    );

    Ok(HttpResponse::Ok().json(StartSessionResponse {
        session_id: Some(session_id),
        websocket_address: state.websocket_address().to_string(),
        session_token: token.into_inner(),
    }))
}

/// `DELETE /session/stop`
pub async fn stop_session(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    info!("Handling session stop request");

    authorize(&req, state.api_key())?;
    let body = parse_object(&body)?;

    // Non-string identifiers fall through to "missing field".
    let request: StopSessionRequest =
        serde_json::from_value(Value::Object(body)).unwrap_or_default();

    let session_id = match request.key() {
        Some(SessionKey::Id(id)) => id,
        Some(SessionKey::Token(token)) => state
            .sessions
            .id_for_token(&token)
            .ok_or(AppError::SessionNotFound)?,
        None => {
            return Err(AppError::Validation(
                "Missing required field: session_id or session_token".to_string(),
            ))
        }
    };

    if !state.sessions.remove(&session_id) {
        warn!(session_id = %session_id, "Stop requested for unknown session");
        return Err(AppError::SessionNotFound);
    }

    info!(
        session_id = %session_id,
        active_sessions = state.sessions.len(),
        "Terminated session"
    );

    Ok(HttpResponse::Ok().json(StopSessionResponse::terminated()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers;
    use crate::middleware;
    use crate::session::MockTokenIssuer;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;
    use std::sync::Arc;

    const KEY: &str = "K";

    fn test_state() -> AppState {
        let mut config = AppConfig::default();
        config.auth.api_key = KEY.to_string();
        AppState::new(config, Arc::new(MockTokenIssuer::new(3600)))
    }

    fn start_body() -> Value {
        json!({
            "avatar_id": "a1",
            "quality": "high",
            "version": "v1",
            "video_encoding": "H264",
            "agora_settings": {
                "app_id": "x",
                "token": "y",
                "channel": "room1",
                "uid": "1",
                "enable_string_uid": false
            }
        })
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .wrap(middleware::cors_headers())
                    .configure(handlers::configure),
            )
            .await
        };
    }

    fn start_request(key: Option<&str>, body: &Value) -> test::TestRequest {
        let mut req = test::TestRequest::post()
            .uri("/session/start")
            .insert_header(("accept", "application/json"))
            .set_json(body);
        if let Some(key) = key {
            req = req.insert_header((API_KEY_HEADER, key));
        }
        req
    }

    fn stop_request(key: Option<&str>, body: &Value) -> test::TestRequest {
        let mut req = test::TestRequest::delete().uri("/session/stop").set_json(body);
        if let Some(key) = key {
            req = req.insert_header((API_KEY_HEADER, key));
        }
        req
    }

    #[actix_web::test]
    async fn test_start_then_stop_scenario() {
        let state = test_state();
        let app = service!(state);

        let resp = test::call_service(&app, start_request(Some(KEY), &start_body()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body: Value = test::read_body_json(resp).await;
        let address = body["websocket_address"].as_str().unwrap();
        assert!(address.starts_with("ws://") || address.starts_with("wss://"));
        assert!(!body["session_token"].as_str().unwrap().is_empty());
        let session_id = body["session_id"].as_str().unwrap().to_string();
        assert!(state.sessions.exists(&session_id));

        let resp = test::call_service(
            &app,
            stop_request(Some(KEY), &json!({ "session_id": session_id })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "status": "success", "message": "Session terminated successfully" }));
        assert!(!state.sessions.exists(&session_id));
    }

    #[actix_web::test]
    async fn test_double_stop_is_not_found() {
        let state = test_state();
        let app = service!(state);

        let resp = test::call_service(&app, start_request(Some(KEY), &start_body()).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        let stop = json!({ "session_id": body["session_id"] });

        let first = test::call_service(&app, stop_request(Some(KEY), &stop).to_request()).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = test::call_service(&app, stop_request(Some(KEY), &stop).to_request()).await;
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(second).await;
        assert_eq!(body["code"], "SESSION_NOT_FOUND");
    }

    #[actix_web::test]
    async fn test_stop_by_session_token() {
        let state = test_state();
        let app = service!(state);

        let resp = test::call_service(&app, start_request(Some(KEY), &start_body()).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            stop_request(Some(KEY), &json!({ "session_token": body["session_token"] })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!state.sessions.exists(&session_id));
    }

    #[actix_web::test]
    async fn test_api_key_checks_leave_store_untouched() {
        let state = test_state();
        let app = service!(state);

        let resp = test::call_service(&app, start_request(None, &start_body()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "MISSING_API_KEY");

        let resp = test::call_service(&app, start_request(Some("wrong"), &start_body()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_API_KEY");

        let resp = test::call_service(&app, start_request(Some(""), &start_body()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(state.sessions.is_empty());

        // A wrong key on stop must not remove a live session either.
        let resp = test::call_service(&app, start_request(Some(KEY), &start_body()).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        let stop = json!({ "session_id": body["session_id"] });
        let resp = test::call_service(&app, stop_request(Some("wrong"), &stop).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = test::call_service(&app, stop_request(None, &stop).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(state.sessions.len(), 1);
    }

    #[actix_web::test]
    async fn test_missing_fields_rejected_without_creating_sessions() {
        let state = test_state();
        let app = service!(state);

        for field in ["avatar_id", "quality", "version", "video_encoding", "agora_settings"] {
            let mut body = start_body();
            body.as_object_mut().unwrap().remove(field);
            let resp = test::call_service(&app, start_request(Some(KEY), &body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "field {}", field);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["code"], "VALIDATION_ERROR");
            assert!(body["message"].as_str().unwrap().contains(field));
        }

        for field in ["app_id", "token", "channel", "uid", "enable_string_uid"] {
            let mut body = start_body();
            body["agora_settings"].as_object_mut().unwrap().remove(field);
            let resp = test::call_service(&app, start_request(Some(KEY), &body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "agora field {}", field);
        }

        assert!(state.sessions.is_empty());
    }

    #[actix_web::test]
    async fn test_enum_and_type_violations() {
        let state = test_state();
        let app = service!(state);

        let mut body = start_body();
        body["quality"] = json!("ultra");
        let resp = test::call_service(&app, start_request(Some(KEY), &body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let mut body = start_body();
        body["video_encoding"] = json!("MPEG2");
        let resp = test::call_service(&app, start_request(Some(KEY), &body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let mut body = start_body();
        body["agora_settings"]["enable_string_uid"] = json!("no");
        let resp = test::call_service(&app, start_request(Some(KEY), &body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");

        assert!(state.sessions.is_empty());
    }

    #[actix_web::test]
    async fn test_invalid_json_body() {
        let state = test_state();
        let app = service!(state);

        let req = test::TestRequest::post()
            .uri("/session/start")
            .insert_header((API_KEY_HEADER, KEY))
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_JSON");
        assert_eq!(body["message"], "Invalid JSON in request body");
    }

    #[actix_web::test]
    async fn test_stop_validation_and_unknown_ids() {
        let state = test_state();
        let app = service!(state);

        let resp = test::call_service(&app, stop_request(Some(KEY), &json!({})).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let resp = test::call_service(
            &app,
            stop_request(Some(KEY), &json!({ "session_token": "invalid_token_that_does_not_exist" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            stop_request(Some(KEY), &json!({ "session_id": "missing" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_numeric_uid_is_accepted() {
        let state = test_state();
        let app = service!(state);

        let mut body = start_body();
        body["agora_settings"]["uid"] = json!(200);
        body["avatar_id"] = json!(7);
        let resp = test::call_service(&app, start_request(Some(KEY), &body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        let session = state.sessions.get(body["session_id"].as_str().unwrap()).unwrap();
        assert_eq!(session.avatar_id, "7");
    }

    #[actix_web::test]
    async fn test_parse_object() {
        assert!(parse_object(b"").unwrap().is_empty());
        assert!(parse_object(b"  \n").unwrap().is_empty());
        assert!(matches!(parse_object(b"[1,2]"), Err(AppError::InvalidJson(_))));
        assert!(matches!(parse_object(b"{"), Err(AppError::InvalidJson(_))));
        assert_eq!(parse_object(br#"{"a":1}"#).unwrap().len(), 1);
    }
}
