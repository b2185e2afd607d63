//! # Avatar Session Mock
//!
//! A stand-in for a streaming-avatar provider, used to exercise avatar integrations
//! locally.
//!
//! ## Services:
//! - **Session control** (HTTP): `POST /session/start` and `DELETE /session/stop`,
//!   guarded by an `x-api-key` header and backed by an in-memory session store
//! - **Audio receiver** (WebSocket): accepts `init`/`voice`/`voice_end`/`voice_interrupt`
//!   frames and writes the received PCM16 audio to a WAV file on disconnect
//!
//! ## Module Map:
//! - **config**: layered configuration for the servers and the test clients
//! - **error**: `AppError` and its HTTP mapping
//! - **session**: request models, validation schema, token issuing, session store
//! - **handlers**: HTTP handlers and route registration
//! - **middleware**: request logging and CORS headers
//! - **audio** / **websocket**: the audio stream state machine and its actor
//! - **client**: library side of the `session_check` and `audio_sender` binaries

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod websocket;
