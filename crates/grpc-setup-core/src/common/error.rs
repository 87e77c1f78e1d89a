//! Error types for the health service process.
//!
//! This module defines the central `Error` enum, which captures every failure
//! the process can observe: configuration and startup failures that end the
//! process, and the few per-request failures the gateway recovers from. It
//! implements `From<Error>` for `tonic::Status` so per-request failures share
//! one code mapping with the RPC layer.
//!
//! ## Error Cases
//! - `InvalidConfig`: Settings failed validation.
//! - `Bind`: A listener could not be bound (port in use, permission denied).
//! - `InvalidEndpoint`: The gateway's gRPC dial target is not a valid URI.
//! - `GatewayConnect`: The gateway could not reach the gRPC server.
//! - `Reflection`: The reflection service could not be built.
//! - `Transport`: The gRPC server stopped with a transport error.
//! - `Serve`: A listener failed while serving.
//! - `Panicked`: A server task panicked.
//! - `Marshal`: An RPC response could not be written as JSON.

use crate::types::Component;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the health service process.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A configuration value failed validation.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Binding a listener failed. Never retried.
    #[error("Failed to bind {component} listener on {addr}: {source}")]
    Bind {
        component: Component,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The gateway's dial target could not be parsed.
    #[error("Invalid gRPC endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The gateway could not establish its client connection.
    #[error("Failed to connect gateway to {endpoint}: {source}")]
    GatewayConnect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The reflection service could not be constructed.
    #[error("Reflection error: {reason}")]
    Reflection { reason: String },

    /// The gRPC server returned a transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A listener failed while serving.
    #[error("{component} server failed: {source}")]
    Serve {
        component: Component,
        #[source]
        source: std::io::Error,
    },

    /// A server task panicked instead of returning.
    #[error("{component} server task panicked")]
    Panicked { component: Component },

    /// A response could not be marshaled to JSON.
    #[error("Marshal error: {0}")]
    Marshal(#[from] serde_json::Error),
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidConfig { reason } => Status::invalid_argument(reason),
            Error::GatewayConnect { .. } | Error::Transport(_) => {
                Status::unavailable(err.to_string())
            }
            Error::Marshal(e) => Status::internal(format!("Failed to marshal response: {e}")),
            other => Status::internal(other.to_string()),
        }
    }
}
