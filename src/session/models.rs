//! Request and response bodies of the session control endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Video quality requested for the avatar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoEncoding {
    #[serde(rename = "H264")]
    H264,
    #[serde(rename = "VP8")]
    Vp8,
    #[serde(rename = "AV1")]
    Av1,
}

/// A field the service passes through without interpreting.
///
/// Any JSON type is accepted; Agora uids in particular are often numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueField(pub Value);

impl OpaqueField {
    /// Strings as-is, anything else as its JSON text.
    pub fn to_text(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for OpaqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Real-time channel the avatar joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgoraSettings {
    pub app_id: OpaqueField,
    pub token: OpaqueField,
    pub channel: OpaqueField,
    pub uid: OpaqueField,
    pub enable_string_uid: bool,
}

/// Body of `POST /session/start`.
///
/// Only deserialized after the schema table in [`super::schema`] has accepted
/// the raw JSON, so serde errors here are type mismatches rather than missing fields.
/// Only the enums and `enable_string_uid` have a type that can be violated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub avatar_id: OpaqueField,
    pub quality: Quality,
    pub version: OpaqueField,
    pub video_encoding: VideoEncoding,
    pub agora_settings: AgoraSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub websocket_address: String,
    pub session_token: String,
}

/// Body of `DELETE /session/stop`.
///
/// Either identifier is accepted; empty strings count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

/// Which key a stop request identifies its session by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKey {
    Id(String),
    Token(String),
}

impl StopSessionRequest {
    /// `session_id` wins when both are present.
    pub fn key(&self) -> Option<SessionKey> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        non_empty(&self.session_id)
            .map(SessionKey::Id)
            .or_else(|| non_empty(&self.session_token).map(SessionKey::Token))
    }
}

/// Success body of `DELETE /session/stop`. Deliberately carries no identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSessionResponse {
    pub status: String,
    pub message: String,
}

impl StopSessionResponse {
    pub fn terminated() -> Self {
        Self {
            status: "success".to_string(),
            message: "Session terminated successfully".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_request_deserialization() {
        let request: StartSessionRequest = serde_json::from_value(json!({
            "avatar_id": "a1",
            "quality": "high",
            "version": "v1",
            "video_encoding": "VP8",
            "agora_settings": {
                "app_id": "x",
                "token": "y",
                "channel": "room1",
                "uid": "1",
                "enable_string_uid": false
            }
        }))
        .unwrap();

        assert_eq!(request.quality, Quality::High);
        assert_eq!(request.video_encoding, VideoEncoding::Vp8);
        assert_eq!(request.agora_settings.channel.to_text(), "room1");
        assert!(!request.agora_settings.enable_string_uid);
    }

    #[test]
    fn test_opaque_fields_accept_any_type() {
        let request: StartSessionRequest = serde_json::from_value(json!({
            "avatar_id": 42,
            "quality": "low",
            "version": "v1",
            "video_encoding": "H264",
            "agora_settings": {
                "app_id": "x",
                "token": null,
                "channel": "room1",
                "uid": 200,
                "enable_string_uid": true
            }
        }))
        .unwrap();

        assert_eq!(request.avatar_id.to_text(), "42");
        assert_eq!(request.agora_settings.uid.to_text(), "200");
        assert_eq!(request.agora_settings.token.to_text(), "null");
        assert_eq!(request.version.to_string(), "v1");
    }

    #[test]
    fn test_stop_key_prefers_session_id() {
        let request = StopSessionRequest {
            session_id: Some("id-1".into()),
            session_token: Some("tok".into()),
        };
        assert_eq!(request.key(), Some(SessionKey::Id("id-1".into())));

        let request = StopSessionRequest {
            session_id: Some("".into()),
            session_token: Some("tok".into()),
        };
        assert_eq!(request.key(), Some(SessionKey::Token("tok".into())));

        assert_eq!(StopSessionRequest::default().key(), None);
    }

    #[test]
    fn test_start_response_omits_missing_session_id() {
        let response = StartSessionResponse {
            session_id: None,
            websocket_address: "ws://localhost:8765".into(),
            session_token: "t".into(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("session_id").is_none());
    }
}
