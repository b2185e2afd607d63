//! # Session Tokens
//!
//! The bearer string returned by `POST /session/start` and later presented to the
//! audio service in an `authorization` header.
//!
//! Issuance sits behind the [`TokenIssuer`] trait. The bundled [`MockTokenIssuer`]
//! produces a three-part `header.claims.signature` string so that clients expecting a
//! JWT-shaped value can parse it, but its header says `alg: none` and its signature
//! segment is the literal `unsigned`: nothing in this service verifies tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::json;
use std::fmt;
use uuid::Uuid;

/// Opaque bearer token handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// First 20 characters, for log lines.
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(20).collect();
        format!("{}...", head)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can mint a token for a new session.
///
/// ## Why a trait:
/// Handlers hold an `Arc<dyn TokenIssuer>`, so a real issuer (signed tokens, an
/// external identity service) can be swapped in without touching the handlers.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self) -> SessionToken;
}

/// Issues unsigned, JWT-shaped tokens.
#[derive(Debug, Clone)]
pub struct MockTokenIssuer {
    ttl_secs: i64,
}

const UNSIGNED_SEGMENT: &str = "unsigned";

impl MockTokenIssuer {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }
}

impl TokenIssuer for MockTokenIssuer {
    fn issue(&self) -> SessionToken {
        let issued_at = Utc::now().timestamp();
        let header = json!({ "alg": "none", "typ": "JWT" });
        let claims = json!({
            "sub": Uuid::new_v4().to_string(),
            "iat": issued_at,
            "exp": issued_at.saturating_add(self.ttl_secs),
        });

        SessionToken(format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string()),
            UNSIGNED_SEGMENT
        ))
    }
}
