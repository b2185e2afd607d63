//! Streams a WAV file to the audio service.
//!
//! Settings come from `client.toml` and `CLIENT_*` variables, e.g.
//! `CLIENT_INPUT_WAV=speech.wav CLIENT_LEGACY_INIT=true audio_sender`.

use anyhow::Result;
use avatar_session_mock::client::AudioSender;
use avatar_session_mock::config::ClientConfig;
use avatar_session_mock::telemetry::{init_tracing, DEFAULT_CLIENT_FILTER};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_CLIENT_FILTER)?;

    let config = ClientConfig::load()?;
    config.validate()?;

    let address = config.websocket_address.clone();
    match AudioSender::new(config).run().await {
        Ok(chunks) => {
            info!("Sent {} chunk(s) to {}", chunks, address);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("Failed to run sender: {:#}", err);
            error!("Make sure the audio service is running at {}", address);
            Ok(ExitCode::FAILURE)
        }
    }
}
