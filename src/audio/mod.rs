//! # Audio Receiver Module
//!
//! Everything behind the WebSocket audio service except the socket itself.
//!
//! ## Key Components:
//! - **Stream**: frame parsing and the per-connection state machine
//! - **Buffer**: ordered accumulation of decoded PCM16 chunks
//! - **Writer**: WAV persistence of the accumulated audio on disconnect
//!
//! ## Audio Format:
//! - **Bit Depth**: 16-bit PCM, little-endian
//! - **Channels**: Mono
//! - **Sample Rate**: whatever the client last announced, 24kHz by default
//!
//! The WebSocket actor lives in `src/websocket.rs`.

pub mod buffer;
pub mod stream;
pub mod writer;

pub use buffer::ChunkBuffer;
pub use stream::{AudioStream, ClientFrame, FrameError, InitInfo, Outcome, Recording, StreamState, VoiceChunk};
