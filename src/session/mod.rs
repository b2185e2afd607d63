//! # Session Control
//!
//! Everything behind `POST /session/start` and `DELETE /session/stop` except the
//! HTTP handlers themselves:
//!
//! - **models**: Typed request/response bodies
//! - **schema**: Required-field and allowed-value tables for request validation
//! - **store**: The in-memory session map
//! - **token**: Session token issuance

pub mod models;
pub mod schema;
pub mod store;
pub mod token;

pub use store::{Session, SessionMetadata, SessionStore};
pub use token::{MockTokenIssuer, SessionToken, TokenIssuer};
