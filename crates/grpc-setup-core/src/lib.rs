#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

/// gRPC service and message definitions generated from `proto/health.proto`.
///
/// ## Service
///
/// - `proto.Health/HealthCheck` - takes `google.protobuf.Empty` (mapped to
///   `()`) and returns a [`HealthStatus`].
///
/// ## Messages
///
/// - [`HealthStatus`] - `{ status: string }`, field 1. Also derives `serde`
///   traits so the gateway can marshal it as `{"status":"OK"}`.
///
/// [`HealthStatus`]: crate::proto::HealthStatus
pub mod proto {
    tonic::include_proto!("proto");

    /// Encoded `FileDescriptorSet` for `proto/health.proto`, registered with
    /// the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("health_descriptor");
}
