//! # Avatar Session Mock - Main Application Entry Point
//!
//! Runs the two mock services side by side in one process:
//!
//! - **Session control** on `server.host:server.port` (default 127.0.0.1:8764)
//! - **Audio receiver** on `audio.host:audio.port` (default 127.0.0.1:8765)
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: both servers run on the actix runtime
//! - **Arc**: the session store is created once and shared by every worker
//! - **static AtomicBool**: a process-wide shutdown flag set by the signal handler
//! - **tokio::select!**: whichever finishes first (a server or a signal) ends the process

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use avatar_session_mock::config::AppConfig;
use avatar_session_mock::middleware::{self, mask_secret, RequestLogging};
use avatar_session_mock::session::MockTokenIssuer;
use avatar_session_mock::state::{AppState, AudioServiceState};
use avatar_session_mock::telemetry::{init_tracing, DEFAULT_SERVER_FILTER};
use avatar_session_mock::{handlers, websocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;

/// Set once SIGINT or SIGTERM arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from defaults, `config.toml`, `.env` and `APP_*` variables
/// 2. **Sets up logging** through `tracing`
/// 3. **Creates shared state** for each service
/// 4. **Starts both servers** and waits for either to exit or for a shutdown signal
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing(DEFAULT_SERVER_FILTER)?;

    let config = AppConfig::load()?;
    config.validate()?;

    let session_addr = format!("{}:{}", config.server.host, config.server.port);
    let audio_addr = format!("{}:{}", config.audio.host, config.audio.port);

    info!("Starting avatar-session-mock v{}", env!("CARGO_PKG_VERSION"));
    info!("Session API:   http://{}", session_addr);
    info!("  POST   /session/start");
    info!("  DELETE /session/stop");
    info!("Audio service: ws://{} (paths / and /ws)", audio_addr);
    info!("Advertised websocket_address: {}", config.session.websocket_address);
    info!("API key: {}", mask_secret(&config.auth.api_key));
    info!("Audio output: {}", config.audio.output_path.display());

    let issuer = Arc::new(MockTokenIssuer::new(config.session.token_ttl_secs));
    let audio_state = web::Data::new(AudioServiceState::new(config.audio.clone()));
    let app_state = AppState::new(config, issuer);

    setup_signal_handlers();

    let session_server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::cors_headers())
            .wrap(RequestLogging)
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&session_addr)?
    .run();

    let audio_server = HttpServer::new(move || {
        App::new()
            .app_data(audio_state.clone())
            .wrap(TracingLogger::default())
            .configure(websocket::configure)
    })
    .bind(&audio_addr)?
    .run();

    let session_handle = session_server.handle();
    let audio_handle = audio_server.handle();
    let session_task = tokio::spawn(session_server);
    let audio_task = tokio::spawn(audio_server);

    tokio::select! {
        result = session_task => report_exit("Session server", result),
        result = audio_task => report_exit("Audio server", result),
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping servers...");
        }
    }

    // Stopping the audio server ends its connections, which flushes their recordings.
    session_handle.stop(true).await;
    audio_handle.stop(true).await;

    info!("Servers stopped gracefully");
    Ok(())
}

fn report_exit(name: &str, result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("{} exited", name),
        Ok(Err(e)) => error!("{} error: {}", name, e),
        Err(e) => error!("{} task error: {}", name, e),
    }
}

/// Set up signal handlers for graceful shutdown.
///
/// ## What this does:
/// - Listens for SIGTERM and SIGINT (Ctrl+C)
/// - When either arrives, sets [`SHUTDOWN_SIGNAL`]
fn setup_signal_handlers() {
    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()),
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll [`SHUTDOWN_SIGNAL`] every 100ms until it is set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
