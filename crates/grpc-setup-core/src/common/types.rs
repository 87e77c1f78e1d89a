//! # Shared Constants for the Health Service
//!
//! This module pins the parts of the contract that both the gRPC server and
//! the HTTP gateway must agree on but that the protobuf schema cannot carry by
//! itself: the status string a healthy process reports and the REST mapping
//! the gateway exposes for `HealthCheck`.
//!
//! ## Constants
//!
//! - [`STATUS_OK`] - The only status the handler ever returns.
//! - [`HEALTH_CHECK_PATH`] - `GET` route mirrored onto `HealthCheck`.
//! - [`HEALTH_CHECK_METHOD`] - Fully-qualified gRPC method name.
//!
//! ## Types
//!
//! - [`Component`] - Names the two servers that share a process.

use crate::proto::HealthStatus;
use core::fmt;

/// Status reported by a live process.
pub const STATUS_OK: &str = "OK";

/// REST path the gateway maps onto `HealthCheck`.
pub const HEALTH_CHECK_PATH: &str = "/_ah/health";

/// Fully-qualified method path of `HealthCheck` on the wire.
pub const HEALTH_CHECK_METHOD: &str = "/proto.Health/HealthCheck";

impl HealthStatus {
    /// Builds the response a healthy process returns.
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
        }
    }
}

/// One of the two network services a process runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    /// The binary gRPC server.
    Grpc,
    /// The HTTP/JSON transcoding gateway.
    Gateway,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Grpc => write!(f, "gRPC"),
            Component::Gateway => write!(f, "gateway"),
        }
    }
}
