//! # Audio Sender
//!
//! Streams a 16-bit WAV file to the audio service the way an avatar backend would.
//!
//! ## Flow:
//! 1. Connect with `authorization: Bearer <session_token>`
//! 2. Send an `init` frame, or the legacy command-less config frame
//! 3. Send the audio as `voice` frames of `chunk_ms` each, retrying failed sends
//! 4. Optionally send `voice_end`
//! 5. Linger so the server can react, then close
//!
//! Anything the server sends back is logged by a background task.

use crate::client::sample_agora_settings;
use crate::config::ClientConfig;
use crate::middleware::mask_secret;
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{LittleEndian, WriteBytesExt};
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::{json, Value};
use std::fmt::Display;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use uuid::Uuid;

/// PCM16 audio read from a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    /// Interleaved little-endian samples
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    pub fn duration_secs(&self) -> f64 {
        let frames = self.bytes.len() / (2 * self.channels.max(1) as usize);
        frames as f64 / self.sample_rate.max(1) as f64
    }
}

/// Read a 16-bit PCM WAV file.
pub fn load_pcm16(path: &Path) -> Result<PcmAudio> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let (header, data) =
        wav::read(&mut file).with_context(|| format!("Failed to read WAV {}", path.display()))?;

    let samples = data
        .try_into_sixteen()
        .map_err(|_| anyhow!("{} is not 16-bit PCM", path.display()))?;

    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.write_i16::<LittleEndian>(sample)?;
    }

    info!(
        path = %path.display(),
        sample_rate = header.sampling_rate,
        channels = header.channel_count,
        bits = header.bits_per_sample,
        "Loaded WAV"
    );

    Ok(PcmAudio {
        bytes,
        sample_rate: header.sampling_rate,
        channels: header.channel_count,
    })
}

/// Bytes in one chunk of `chunk_ms` milliseconds.
pub fn chunk_len(sample_rate: u32, channels: u16, chunk_ms: u32) -> usize {
    let frames = (sample_rate as u64 * chunk_ms as u64 / 1000).max(1);
    frames as usize * 2 * channels.max(1) as usize
}

pub fn voice_frame(chunk: &[u8], sample_rate: u32, event_id: &str) -> Value {
    json!({
        "command": "voice",
        "audio": STANDARD.encode(chunk),
        "sampleRate": sample_rate,
        "encoding": "PCM16",
        "event_id": event_id
    })
}

/// The opening frame. The legacy form is the same object without `command`.
pub fn init_frame(avatar_id: &str, legacy: bool) -> Value {
    let mut frame = json!({
        "avatar_id": avatar_id,
        "quality": "high",
        "version": "v1",
        "video_encoding": "H264",
        "agora_settings": sample_agora_settings()
    });
    if !legacy {
        frame["command"] = json!("init");
    }
    frame
}

/// Send `message`, retrying up to `attempts` times with `backoff` between tries.
pub async fn send_with_retry<S>(sink: &mut S, message: Message, attempts: u32, backoff: Duration) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match sink.send(message.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(attempt, "Send failed: {}", err);
                last_error = err.to_string();
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    bail!("Failed to send after {} attempts: {}", attempts, last_error)
}

/// Drives one streaming run from a [`ClientConfig`].
pub struct AudioSender {
    config: ClientConfig,
}

impl AudioSender {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Send the configured WAV file and return how many chunks went out.
    pub async fn run(&self) -> Result<usize> {
        let audio = load_pcm16(&self.config.input_wav)?;
        info!(
            bytes = audio.bytes.len(),
            duration_secs = %format!("{:.2}", audio.duration_secs()),
            "Prepared audio"
        );

        let mut request = self
            .config
            .websocket_address
            .as_str()
            .into_client_request()
            .context("Invalid websocket_address")?;
        let bearer = format!("Bearer {}", self.config.session_token);
        request
            .headers_mut()
            .insert("authorization", HeaderValue::from_str(&bearer)?);

        info!(
            address = %self.config.websocket_address,
            authorization = %mask_secret(&bearer),
            "Connecting to audio service"
        );
        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .with_context(|| format!("Failed to connect to {}", self.config.websocket_address))?;
        info!("WebSocket connected");

        let (mut sink, mut incoming) = socket.split();
        let listener = tokio::spawn(async move {
            while let Some(message) = incoming.next().await {
                match message {
                    Ok(Message::Text(text)) => info!(message = %text, "Received message"),
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "Server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        error!("Error reading from WebSocket: {}", err);
                        break;
                    }
                }
            }
        });

        let attempts = self.config.send_attempts;
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);

        let init = init_frame(&self.config.avatar_id, self.config.legacy_init);
        send_with_retry(&mut sink, Message::Text(init.to_string()), attempts, backoff).await?;
        info!(legacy = self.config.legacy_init, "Sent initial configuration");

        let step = chunk_len(audio.sample_rate, audio.channels, self.config.chunk_ms);
        let mut sent = 0;
        for chunk in audio.bytes.chunks(step) {
            let event_id = Uuid::new_v4().to_string();
            let frame = voice_frame(chunk, audio.sample_rate, &event_id);

            match send_with_retry(&mut sink, Message::Text(frame.to_string()), attempts, backoff).await {
                Ok(()) => {
                    sent += 1;
                    info!(chunk = sent, event_id = %event_id, bytes = chunk.len(), "Sent audio chunk");
                }
                Err(err) => error!(event_id = %event_id, "{:#}", err),
            }

            tokio::time::sleep(Duration::from_millis(self.config.inter_chunk_delay_ms)).await;
        }

        if self.config.send_voice_end {
            let end = json!({ "command": "voice_end", "event_id": Uuid::new_v4().to_string() });
            send_with_retry(&mut sink, Message::Text(end.to_string()), attempts, backoff).await?;
            info!("Sent voice_end");
        }

        tokio::time::sleep(Duration::from_millis(self.config.linger_ms)).await;

        if let Err(err) = sink.close().await {
            warn!("Error closing WebSocket: {}", err);
        }
        listener.abort();
        info!(chunks = sent, "Finished sending WAV");

        Ok(sent)
    }
}
