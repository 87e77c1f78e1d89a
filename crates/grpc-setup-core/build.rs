/// Builds the gRPC client and server code for the `health.proto` definition
/// using `tonic-prost-build`.
///
/// # JSON Support
///
/// `HealthStatus` is annotated with `serde` derives so the HTTP gateway can
/// marshal RPC responses straight to JSON without a hand-written mirror type.
///
/// # Files and Paths
///
/// - Proto file: `proto/health.proto`
/// - Includes: `proto/` (plus the well-known types shipped with `protoc`)
///
/// # Output
///
/// The generated module is exposed as `grpc_setup_core::proto`, together with
/// the encoded file descriptor set used by the reflection service.
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("health_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .type_attribute(
            ".proto.HealthStatus",
            "#[derive(serde::Serialize, serde::Deserialize)]",
        )
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/health.proto"], &["proto"])
        .unwrap();
}
