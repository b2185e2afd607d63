//! # Audio Stream Protocol
//!
//! Frame parsing and the per-connection state machine of the WebSocket audio service.
//!
//! ## Frames (client → server, JSON text):
//! - `{"command": "init", "avatar_id", "quality", "version", "video_encoding", "agora_settings"}`
//! - `{"command": "voice", "audio": <base64>, "sampleRate": 24000, "encoding": "PCM16", "event_id"}`
//! - `{"command": "voice_end"}` and `{"command": "voice_interrupt"}`
//! - Legacy config: an object with `avatar_id` and no `command`, treated like `init`
//!
//! ## States:
//! ```text
//! Uninitialized --init/legacy--> Initialized --close--> Closed
//!                                    |  ^
//!                                    +--+ voice (append) / voice_interrupt (clear)
//! ```
//!
//! Every (state, frame) pair is handled explicitly in [`AudioStream::apply`]; the
//! returned [`Outcome`] tells the caller what to log. The server never answers frames.

use crate::audio::buffer::ChunkBuffer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Metadata carried by `init` and legacy config frames. Nothing here is validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitInfo {
    pub avatar_id: Option<String>,
    pub quality: Option<String>,
    pub version: Option<String>,
    pub video_encoding: Option<String>,
    pub agora_settings: Option<Map<String, Value>>,
}

impl InitInfo {
    fn from_value(value: &Value) -> Self {
        Self {
            avatar_id: text_field(value, "avatar_id"),
            quality: text_field(value, "quality"),
            version: text_field(value, "version"),
            video_encoding: text_field(value, "video_encoding"),
            agora_settings: value.get("agora_settings").and_then(Value::as_object).cloned(),
        }
    }

    /// One agora setting rendered for logs.
    pub fn agora(&self, key: &str) -> Option<String> {
        self.agora_settings
            .as_ref()
            .and_then(|settings| settings.get(key))
            .map(render)
    }
}

/// Strings are taken as-is; any other JSON value is rendered, so odd types still log.
fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).filter(|v| !v.is_null()).map(render)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct VoiceFrame {
    #[serde(default)]
    audio: Option<String>,
    #[serde(rename = "sampleRate", default)]
    sample_rate: Option<u32>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    event_id: Option<String>,
}

/// A decoded `voice` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceChunk {
    pub data: Vec<u8>,
    /// `None` when the frame omitted `sampleRate`
    pub sample_rate: Option<u32>,
    /// Informational only; the payload is always treated as PCM16
    pub encoding: String,
    pub event_id: Option<String>,
}

/// One parsed client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Init(InitInfo),
    LegacyConfig(InitInfo),
    Voice(VoiceChunk),
    VoiceEnd { event_id: Option<String> },
    VoiceInterrupt { event_id: Option<String> },
    Unknown { command: Option<String> },
}

/// Why a text frame could not be turned into a [`ClientFrame`].
#[derive(Debug)]
pub enum FrameError {
    Json(serde_json::Error),
    Audio(base64::DecodeError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Json(err) => write!(f, "Failed to parse JSON: {}", err),
            FrameError::Audio(err) => write!(f, "Failed to decode base64 audio: {}", err),
        }
    }
}

impl std::error::Error for FrameError {}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::Json)?;

        let raw_command = value.get("command");
        let command = raw_command.and_then(Value::as_str);
        let no_command = raw_command.map_or(true, |c| c.is_null() || command == Some(""));

        if no_command && value.get("avatar_id").is_some() {
            return Ok(ClientFrame::LegacyConfig(InitInfo::from_value(&value)));
        }

        let event_id = || value.get("event_id").and_then(Value::as_str).map(str::to_string);

        let frame = match command {
            Some("init") => ClientFrame::Init(InitInfo::from_value(&value)),
            Some("voice") => ClientFrame::Voice(decode_voice(value.clone())?),
            Some("voice_end") => ClientFrame::VoiceEnd { event_id: event_id() },
            Some("voice_interrupt") => ClientFrame::VoiceInterrupt { event_id: event_id() },
            Some(other) => ClientFrame::Unknown { command: Some(other.to_string()) },
            None => ClientFrame::Unknown {
                command: raw_command.filter(|c| !c.is_null()).map(Value::to_string),
            },
        };

        Ok(frame)
    }
}

fn decode_voice(value: Value) -> Result<VoiceChunk, FrameError> {
    let frame: VoiceFrame = serde_json::from_value(value).map_err(FrameError::Json)?;

    let data = match frame.audio.as_deref() {
        Some(encoded) if !encoded.is_empty() => STANDARD.decode(encoded).map_err(FrameError::Audio)?,
        _ => Vec::new(),
    };

    Ok(VoiceChunk {
        data,
        sample_rate: frame.sample_rate,
        encoding: frame.encoding.unwrap_or_else(|| "PCM16".to_string()),
        event_id: frame.event_id,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    Initialized,
    Closed,
}

/// What applying a frame did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `init` or legacy config accepted; `repeated` when already initialized
    Initialized { info: InitInfo, legacy: bool, repeated: bool },
    /// A `voice` chunk was appended
    Buffered {
        chunk: usize,
        bytes: usize,
        sample_rate: u32,
        encoding: String,
        event_id: Option<String>,
    },
    /// Audio command received before initialization; nothing changed
    Rejected { command: &'static str },
    /// `voice_end` received; advisory only
    BoundaryMarked { buffered_bytes: usize, event_id: Option<String> },
    /// `voice_interrupt` received; buffer cleared
    Interrupted { discarded_bytes: usize },
    /// Unrecognized command
    Ignored { command: Option<String> },
    /// Frame arrived after the stream was closed
    AfterClose,
}

/// Audio accumulated by a connection, ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
    pub chunk_count: usize,
}

/// Per-connection state: the protocol state plus the audio buffer.
#[derive(Debug)]
pub struct AudioStream {
    state: StreamState,
    buffer: ChunkBuffer,
    default_sample_rate: u32,
    chunks_received: usize,
}

impl AudioStream {
    pub fn new(default_sample_rate: u32) -> Self {
        Self {
            state: StreamState::Uninitialized,
            buffer: ChunkBuffer::new(),
            default_sample_rate,
            chunks_received: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len_bytes()
    }

    pub fn apply(&mut self, frame: ClientFrame) -> Outcome {
        use StreamState::{Closed, Initialized, Uninitialized};

        match (self.state, frame) {
            (Closed, _) => Outcome::AfterClose,

            (state, ClientFrame::Init(info)) => self.initialize(state, info, false),
            (state, ClientFrame::LegacyConfig(info)) => self.initialize(state, info, true),

            (Uninitialized, ClientFrame::Voice(_)) => Outcome::Rejected { command: "voice" },
            (Uninitialized, ClientFrame::VoiceEnd { .. }) => Outcome::Rejected { command: "voice_end" },
            (Uninitialized, ClientFrame::VoiceInterrupt { .. }) => {
                Outcome::Rejected { command: "voice_interrupt" }
            }

            (Initialized, ClientFrame::Voice(chunk)) => {
                self.chunks_received += 1;
                let sample_rate = chunk.sample_rate.unwrap_or(self.default_sample_rate);
                let bytes = chunk.data.len();
                self.buffer.push(chunk.data, sample_rate);

                Outcome::Buffered {
                    chunk: self.chunks_received,
                    bytes,
                    sample_rate,
                    encoding: chunk.encoding,
                    event_id: chunk.event_id,
                }
            }
            (Initialized, ClientFrame::VoiceEnd { event_id }) => Outcome::BoundaryMarked {
                buffered_bytes: self.buffer.len_bytes(),
                event_id,
            },
            (Initialized, ClientFrame::VoiceInterrupt { .. }) => Outcome::Interrupted {
                discarded_bytes: self.buffer.clear(),
            },

            (_, ClientFrame::Unknown { command }) => Outcome::Ignored { command },
        }
    }

    fn initialize(&mut self, previous: StreamState, info: InitInfo, legacy: bool) -> Outcome {
        self.state = StreamState::Initialized;
        Outcome::Initialized {
            info,
            legacy,
            repeated: previous == StreamState::Initialized,
        }
    }

    /// Move to `Closed` and hand back the buffered audio, if any.
    ///
    /// The whole recording uses the last sample rate announced by a `voice` frame.
    /// Closing twice yields `None` the second time.
    pub fn close(&mut self) -> Option<Recording> {
        if self.state == StreamState::Closed {
            return None;
        }
        self.state = StreamState::Closed;

        if self.buffer.is_empty() {
            return None;
        }

        let recording = Recording {
            pcm: self.buffer.concatenate(),
            sample_rate: self.buffer.last_sample_rate().unwrap_or(self.default_sample_rate),
            chunk_count: self.buffer.chunk_count(),
        };
        self.buffer.clear();
        Some(recording)
    }
}
