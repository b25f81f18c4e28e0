//! Mediarelay API Library
//!
//! HTTP surface of the relay: `POST /upload` runs one pipeline and records the
//! result, `GET /status` reports liveness and optional dependency checks.

pub mod error;
mod handlers;
pub mod setup;
pub mod state;

pub use error::HttpRelayError;
pub use state::AppState;
