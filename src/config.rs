//! # Configuration Management
//!
//! This module handles loading and managing configuration from multiple sources:
//! - TOML configuration files (config.toml for the servers, client.toml for the test clients)
//! - Environment variables (APP_ prefix for the servers, CLIENT_ prefix for the clients)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl Default**: Every setting has a value that works for local testing out of the box
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER__PORT, APP_AUTH__API_KEY, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! Nested keys use a double underscore so that field names containing an
//! underscore survive: `APP_SESSION__WEBSOCKET_ADDRESS` maps to `session.websocket_address`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Sample rate assumed for `voice` frames that omit `sampleRate`.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// 16 MiB. actix's own default of 64 KiB is smaller than half a second of
/// base64-encoded 48kHz stereo audio.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Main server configuration that contains all settings.
///
/// ## Why separate config structs:
/// The session control service and the audio service listen on different ports
/// and care about different settings, so each gets its own group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub audio: AudioConfig,
}

/// Where the HTTP session control service listens.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// API key expected in the `x-api-key` header of every session request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub api_key: String,
}

/// Settings that shape the start-session response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Address handed back to callers; must use the `ws://` or `wss://` scheme
    pub websocket_address: String,

    /// Lifetime written into issued tokens (informational, never enforced)
    pub token_ttl_secs: u64,
}

/// WebSocket audio service settings.
///
/// ## Fields:
/// - `host`/`port`: Where the audio receiver listens
/// - `output_path`: WAV file written when a connection with buffered audio closes
/// - `default_sample_rate`: Used when a `voice` frame carries no `sampleRate`
/// - `max_frame_bytes`: Largest WebSocket frame accepted before the connection fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub host: String,
    pub port: u16,
    pub output_path: PathBuf,
    pub default_sample_rate: u32,
    pub max_frame_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            output_path: PathBuf::from("received_audio.wav"),
            default_sample_rate: DEFAULT_SAMPLE_RATE,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// The defaults mirror the mock API's documented local setup (HTTP on 8764,
/// WebSocket on 8765), so the server and the clients find each other with no
/// configuration at all.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8764,
            },
            auth: AuthConfig {
                api_key: "YOUR_API_KEY".to_string(),
            },
            session: SessionConfig {
                websocket_address: "ws://localhost:8765".to_string(),
                token_ttl_secs: 3600,
            },
            audio: AudioConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_AUTH__API_KEY=secret`: Override the expected API key
    /// - `APP_AUDIO__OUTPUT_PATH=/tmp/out.wav`: Override the WAV output path
    /// - `PORT=3000`: Special case for deployment platforms (session service port)
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Neither port is 0 and the two services do not share a port on the same host
    /// - The API key is not empty (an empty key would make every request "missing" one)
    /// - The advertised WebSocket address uses a WebSocket scheme
    /// - The default sample rate is positive
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 || self.audio.port == 0 {
            return Err(anyhow::anyhow!("Server ports cannot be 0"));
        }

        if self.server.host == self.audio.host && self.server.port == self.audio.port {
            return Err(anyhow::anyhow!(
                "Session and audio services cannot share {}:{}",
                self.server.host,
                self.server.port
            ));
        }

        if self.auth.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("API key cannot be empty"));
        }

        if !is_websocket_url(&self.session.websocket_address) {
            return Err(anyhow::anyhow!(
                "websocket_address must start with ws:// or wss://, got {}",
                self.session.websocket_address
            ));
        }

        if self.audio.default_sample_rate == 0 {
            return Err(anyhow::anyhow!("Default sample rate must be greater than 0"));
        }

        if self.audio.max_frame_bytes < 64 * 1024 {
            return Err(anyhow::anyhow!("max_frame_bytes must be at least 64 KiB"));
        }

        Ok(())
    }
}

/// Settings shared by the `session_check` and `audio_sender` test clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the session control service, without a trailing path
    pub api_base_url: String,
    pub api_key: String,
    pub websocket_address: String,
    /// Sent as `authorization: Bearer <token>` when connecting to the audio service
    pub session_token: String,
    pub input_wav: PathBuf,
    pub avatar_id: String,
    /// Length of each `voice` chunk in milliseconds of audio
    pub chunk_ms: u32,
    pub send_attempts: u32,
    pub retry_backoff_ms: u64,
    pub inter_chunk_delay_ms: u64,
    /// How long to keep the connection open after the last chunk
    pub linger_ms: u64,
    /// Send the command-less config frame instead of an `init` command
    pub legacy_init: bool,
    pub send_voice_end: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8764".to_string(),
            api_key: "YOUR_API_KEY".to_string(),
            websocket_address: "ws://localhost:8765".to_string(),
            session_token: "ws_session_token_here".to_string(),
            input_wav: PathBuf::from("input.wav"),
            avatar_id: "avatar123".to_string(),
            chunk_ms: 500,
            send_attempts: 3,
            retry_backoff_ms: 10,
            inter_chunk_delay_ms: 10,
            linger_ms: 2000,
            legacy_init: false,
            send_voice_end: false,
        }
    }
}

impl ClientConfig {
    /// Load client settings: defaults, then `client.toml`, then `CLIENT_*` variables.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&ClientConfig::default())?)
            .add_source(config::File::with_name("client").required(false))
            .add_source(config::Environment::with_prefix("CLIENT").prefix_separator("_"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_websocket_url(&self.websocket_address) {
            return Err(anyhow::anyhow!(
                "websocket_address must start with ws:// or wss://, got {}",
                self.websocket_address
            ));
        }

        if self.chunk_ms == 0 || self.send_attempts == 0 {
            return Err(anyhow::anyhow!("chunk_ms and send_attempts must be greater than 0"));
        }

        Ok(())
    }
}

/// True for `ws://` and `wss://` URLs.
pub fn is_websocket_url(address: &str) -> bool {
    address.starts_with("ws://") || address.starts_with("wss://")
}
