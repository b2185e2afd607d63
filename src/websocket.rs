//! # WebSocket Audio Receiver
//!
//! Accepts avatar audio streams on `/` and `/ws` of the audio port and writes each
//! connection's audio to a WAV file when the connection ends.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: the client connects, usually with `Authorization: Bearer <session_token>`.
//!    The header is logged but not checked.
//! 2. **Initialization**: an `init` frame (or a legacy config frame) arms the connection
//! 3. **Audio Streaming**: `voice` frames carry base64 PCM16 chunks that are buffered
//! 4. **Control**: `voice_interrupt` discards the buffer, `voice_end` is only logged
//! 5. **Persistence**: on disconnect the buffer is written to the configured WAV path
//!
//! ## Message Format:
//! - **Client → Server**: JSON text frames, see [`crate::audio::stream`]
//! - **Server → Client**: nothing apart from protocol pongs
//!
//! ## Actor Model:
//! Each connection is an independent actix actor owning its [`AudioStream`], so
//! frames of one connection are handled strictly in order and no state is shared.

use crate::audio::stream::{AudioStream, ClientFrame, Outcome};
use crate::audio::writer;
use crate::middleware::mask_secret;
use crate::state::AudioServiceState;

use actix::prelude::*;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// WebSocket actor for one audio connection.
pub struct AudioReceiver {
    /// `client_<n>`, used to tag every log line of this connection
    client_id: String,

    /// Protocol state plus buffered audio
    stream: AudioStream,

    /// Where the recording is written on disconnect
    output_path: PathBuf,
}

impl AudioReceiver {
    pub fn new(client_id: String, default_sample_rate: u32, output_path: PathBuf) -> Self {
        Self {
            client_id,
            stream: AudioStream::new(default_sample_rate),
            output_path,
        }
    }

    fn handle_text(&mut self, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(client = %self.client_id, "Dropping frame: {}", err);
                return;
            }
        };

        let outcome = self.stream.apply(frame);
        self.log_outcome(outcome);
    }

    fn log_outcome(&self, outcome: Outcome) {
        let client = self.client_id.as_str();

        match outcome {
            Outcome::Initialized { info, legacy, repeated } => {
                let kind = if legacy { "legacy config" } else { "init" };
                if repeated {
                    info!(client, "Received {} on an initialized connection", kind);
                } else {
                    info!(client, "Connection initialized via {}", kind);
                }
                info!(
                    client,
                    avatar_id = info.avatar_id.as_deref().unwrap_or("-"),
                    quality = info.quality.as_deref().unwrap_or("-"),
                    version = info.version.as_deref().unwrap_or("-"),
                    video_encoding = info.video_encoding.as_deref().unwrap_or("-"),
                    "Avatar settings"
                );
                if info.agora_settings.is_some() {
                    info!(
                        client,
                        app_id = info.agora("app_id").as_deref().unwrap_or("-"),
                        channel = info.agora("channel").as_deref().unwrap_or("-"),
                        uid = info.agora("uid").as_deref().unwrap_or("-"),
                        enable_string_uid = info.agora("enable_string_uid").as_deref().unwrap_or("-"),
                        "Agora settings"
                    );
                }
            }
            Outcome::Buffered { chunk, bytes, sample_rate, encoding, event_id } => {
                debug!(
                    client,
                    chunk,
                    bytes,
                    sample_rate,
                    encoding = %encoding,
                    event_id = event_id.as_deref().unwrap_or("-"),
                    buffered = self.stream.buffered_bytes(),
                    "Buffered voice chunk"
                );
            }
            Outcome::Rejected { command } => {
                warn!(client, command, "Received {} before initialization, dropping", command);
            }
            Outcome::BoundaryMarked { buffered_bytes, event_id } => {
                info!(
                    client,
                    buffered_bytes,
                    event_id = event_id.as_deref().unwrap_or("-"),
                    "Voice segment ended"
                );
            }
            Outcome::Interrupted { discarded_bytes } => {
                info!(client, discarded_bytes, "Voice interrupted, buffer cleared");
            }
            Outcome::Ignored { command } => {
                warn!(client, command = command.as_deref().unwrap_or("-"), "Ignoring unknown command");
            }
            Outcome::AfterClose => {
                debug!(client, "Ignoring frame received after close");
            }
        }
    }

    /// Write whatever audio this connection buffered.
    fn persist(&mut self) {
        let chunks = self.stream.chunks_received();

        match self.stream.close() {
            Some(recording) => {
                info!(
                    client = %self.client_id,
                    chunks,
                    bytes = recording.pcm.len(),
                    "Connection closed, saving audio"
                );
                if let Err(err) = writer::save_recording(&self.output_path, &recording) {
                    error!(client = %self.client_id, "Failed to save audio: {:#}", err);
                }
            }
            None => {
                info!(client = %self.client_id, chunks, "Connection closed with no audio to save");
            }
        }
    }
}

impl Actor for AudioReceiver {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(client = %self.client_id, "WebSocket connection started");
    }

    /// Persistence happens here so that every way of ending the connection
    /// (close frame, protocol error, dropped socket) flushes the buffer.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.persist();
        info!(client = %self.client_id, "WebSocket connection stopped");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for AudioReceiver {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.handle_text(&text),
            Ok(ws::Message::Binary(data)) => {
                warn!(client = %self.client_id, bytes = data.len(), "Dropping binary frame, expected JSON text");
            }
            Ok(ws::Message::Ping(data)) => ctx.pong(&data),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                info!(client = %self.client_id, "WebSocket closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(client = %self.client_id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(client = %self.client_id, "WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler.
///
/// ## HTTP to WebSocket Upgrade:
/// Upgrades the request and hands the connection to a fresh [`AudioReceiver`].
/// The session token in the `Authorization` header is logged (masked) only.
pub async fn audio_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AudioServiceState>,
) -> ActixResult<HttpResponse> {
    let client_id = state.next_client_id();

    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(mask_secret);

    info!(
        client = %client_id,
        peer = ?req.connection_info().peer_addr(),
        path = %req.path(),
        authorization = authorization.as_deref().unwrap_or("<none>"),
        "New WebSocket connection"
    );

    let receiver = AudioReceiver::new(
        client_id,
        state.config.default_sample_rate,
        state.config.output_path.clone(),
    );

    ws::WsResponseBuilder::new(receiver, &req, stream)
        .frame_size(state.config.max_frame_bytes)
        .start()
}

/// Register the audio routes. Both paths behave identically.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(audio_websocket))
        .route("/ws", web::get().to(audio_websocket));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use actix_web::{App, HttpServer};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use futures_util::SinkExt;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    fn start_server(output_path: PathBuf) -> (SocketAddr, actix_web::dev::ServerHandle) {
        let state = web::Data::new(AudioServiceState::new(AudioConfig {
            output_path,
            ..AudioConfig::default()
        }));

        let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        (addr, handle)
    }

    async fn wait_for(path: &Path) -> bool {
        for _ in 0..100 {
            if path.exists() {
                return true;
            }
            actix_web::rt::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    fn voice(bytes: &[u8], rate: u32) -> Message {
        Message::Text(
            json!({
                "command": "voice",
                "audio": STANDARD.encode(bytes),
                "sampleRate": rate,
                "encoding": "PCM16"
            })
            .to_string(),
        )
    }

    fn read_samples(path: &Path) -> (u32, Vec<i16>) {
        let mut file = std::fs::File::open(path).unwrap();
        let (header, data) = wav::read(&mut file).unwrap();
        let samples = data.try_into_sixteen().unwrap();
        (header.sampling_rate, samples)
    }

    #[actix_web::test]
    async fn test_stream_is_saved_on_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("received_audio.wav");
        let (addr, handle) = start_server(output.clone());

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();

        // Dropped: not initialized yet.
        socket.send(voice(&[9, 9], 24000)).await.unwrap();
        socket
            .send(Message::Text(r#"{"command":"init","avatar_id":"a1"}"#.to_string()))
            .await
            .unwrap();
        socket.send(Message::Text("not json".to_string())).await.unwrap();
        socket.send(voice(&[1, 0, 2, 0], 16000)).await.unwrap();
        socket.send(voice(&[3, 0], 16000)).await.unwrap();
        socket
            .send(Message::Text(r#"{"command":"voice_end"}"#.to_string()))
            .await
            .unwrap();
        socket.close(None).await.unwrap();

        assert!(wait_for(&output).await, "recording was not written");
        let (rate, samples) = read_samples(&output);
        assert_eq!(rate, 16000);
        assert_eq!(samples, vec![1, 2, 3]);

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_large_voice_frame_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("large.wav");
        let (addr, handle) = start_server(output.clone());

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();
        socket
            .send(Message::Text(r#"{"command":"init"}"#.to_string()))
            .await
            .unwrap();

        // Half a second of 48kHz stereo PCM16, well over 64 KiB once base64-encoded.
        let large = vec![1u8; 96000];
        socket.send(voice(&[2u8; 1000], 48000)).await.unwrap();
        socket.send(voice(&large, 48000)).await.unwrap();
        socket.send(voice(&[3u8; 1000], 48000)).await.unwrap();
        socket.close(None).await.unwrap();

        assert!(wait_for(&output).await, "recording was not written");
        let (rate, samples) = read_samples(&output);
        assert_eq!(rate, 48000);
        assert_eq!(samples.len(), (1000 + 96000 + 1000) / 2);
        assert_eq!(samples[0], 0x0202);
        assert_eq!(samples[500], 0x0101);
        assert_eq!(*samples.last().unwrap(), 0x0303);

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_legacy_config_on_root_path() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("legacy.wav");
        let (addr, handle) = start_server(output.clone());

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/", addr))
            .await
            .unwrap();
        socket
            .send(Message::Text(r#"{"avatar_id":"avatar123","quality":"high"}"#.to_string()))
            .await
            .unwrap();
        socket.send(voice(&[5, 0, 6, 0], 24000)).await.unwrap();
        socket
            .send(Message::Text(r#"{"command":"voice_interrupt"}"#.to_string()))
            .await
            .unwrap();
        socket.send(voice(&[7, 0], 24000)).await.unwrap();
        socket.close(None).await.unwrap();

        assert!(wait_for(&output).await, "recording was not written");
        let (_, samples) = read_samples(&output);
        assert_eq!(samples, vec![7]);

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_no_file_without_audio() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("empty.wav");
        let (addr, handle) = start_server(output.clone());

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();
        socket
            .send(Message::Text(r#"{"command":"init"}"#.to_string()))
            .await
            .unwrap();
        socket.close(None).await.unwrap();

        actix_web::rt::time::sleep(Duration::from_millis(300)).await;
        assert!(!output.exists());

        handle.stop(true).await;
    }
}
