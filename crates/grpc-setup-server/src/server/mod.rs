//! Everything the `grpc-setup-server` binary runs: configuration, the gRPC
//! service, the HTTP gateway in front of it, and the bootstrap that ties the
//! two together.

pub mod bootstrap;
pub mod config;
pub mod gateway;
pub mod service;
pub mod telemetry;
