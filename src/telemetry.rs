//! # Tracing Setup
//!
//! Shared by the server and both client binaries.
//!
//! ## Environment Variables:
//! - `RUST_LOG`: overrides the filter (e.g. "debug", "avatar_session_mock=trace")
//! - Unset: each binary passes its own default filter

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used by the server when `RUST_LOG` is not set.
pub const DEFAULT_SERVER_FILTER: &str = "avatar_session_mock=debug,actix_web=info";

/// Filter used by the test clients when `RUST_LOG` is not set.
pub const DEFAULT_CLIENT_FILTER: &str = "avatar_session_mock=info,session_check=info,audio_sender=info";

/// Install the global fmt subscriber.
///
/// Fails if a subscriber has already been installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
