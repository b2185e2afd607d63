//! # Application State Management
//!
//! Shared state handed to request handlers through `web::Data`.
//!
//! ## Arc pattern
//! Actix builds one `App` per worker thread, so anything that must be seen by every
//! worker (the session store, the connection counter) is created once, outside the
//! `HttpServer::new` closure, and shared through an `Arc`. Cloning the state only
//! clones the pointers.
//!
//! The session store brings its own `Mutex`; configuration never changes after
//! startup, so it needs no lock at all.

use crate::config::{AppConfig, AudioConfig};
use crate::session::{SessionStore, TokenIssuer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// State of the HTTP session control service.
#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded at startup (read-only afterwards)
    pub config: Arc<AppConfig>,

    /// Active sessions, shared by every worker
    pub sessions: Arc<SessionStore>,

    /// Mints the token returned by `POST /session/start`
    pub tokens: Arc<dyn TokenIssuer>,
}

impl AppState {
    pub fn new(config: AppConfig, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new()),
            tokens,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.config.auth.api_key
    }

    pub fn websocket_address(&self) -> &str {
        &self.config.session.websocket_address
    }
}

/// State of the WebSocket audio service.
///
/// Each connection owns its own audio buffer, so the only thing shared between
/// connections is a counter used to name them in logs.
#[derive(Debug)]
pub struct AudioServiceState {
    pub config: AudioConfig,
    connections: AtomicUsize,
}

impl AudioServiceState {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            connections: AtomicUsize::new(0),
        }
    }

    /// Returns `client_0`, `client_1`, ... in connection order.
    pub fn next_client_id(&self) -> String {
        let n = self.connections.fetch_add(1, Ordering::SeqCst);
        format!("client_{}", n)
    }

    /// Total connections accepted since startup.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}
