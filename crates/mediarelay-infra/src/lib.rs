//! Mediarelay Infrastructure Library
//!
//! Shared infrastructure for the relay service:
//! - Telemetry initialization
//! - Request ID middleware
//! - The JSON error body returned by the HTTP surface

pub mod error;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use error::ErrorResponse;
pub use middleware::{request_id_middleware, RequestId};
pub use telemetry::init_telemetry;
