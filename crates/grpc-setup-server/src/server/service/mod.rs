//! gRPC side of the process.
//!
//! ## Structure
//!
//! - [`handler`] - `proto.Health` implementation (`HealthService`).
//! - [`grpc`] - Builds the tonic server around the handler and serves it on a
//!   bound listener.

pub mod grpc;
pub mod handler;
