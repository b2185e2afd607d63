//! # Test Clients
//!
//! Library side of the `session_check` and `audio_sender` binaries.
//!
//! - **session**: drives the HTTP session control service and verifies its replies
//! - **sender**: streams a WAV file to the audio service as `voice` frames

pub mod sender;
pub mod session;

pub use sender::AudioSender;
pub use session::{run_session_checks, CheckResult, SessionClient};

use serde_json::{json, Value};

/// Agora settings used by both clients. The service never inspects the values.
pub fn sample_agora_settings() -> Value {
    json!({
        "app_id": "dllkSlkdmmppollalepls",
        "token": "lkmmopplek",
        "channel": "room1",
        "uid": "333",
        "enable_string_uid": false
    })
}
