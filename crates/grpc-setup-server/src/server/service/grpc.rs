//! tonic server assembly for the health service.
//!
//! Besides `proto.Health` the server registers the standard
//! `grpc.health.v1.Health` service (reporting `proto.Health` as `SERVING`) and
//! v1 server reflection, so stock tooling such as `grpcurl` and
//! `grpc_health_probe` works against it unchanged.

use crate::server::service::handler::HealthService;
use grpc_setup_core::{
    Error, Result,
    proto::{FILE_DESCRIPTOR_SET, health_server::HealthServer},
    types::Component,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;

/// Serves the gRPC services on an already-bound listener until the transport
/// fails or `shutdown` is cancelled.
///
/// Binding happens before this is called so that a port conflict surfaces
/// during startup, before either server accepts traffic.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
    let local_addr = listener.local_addr().map_err(|source| Error::Serve {
        component: Component::Grpc,
        source,
    })?;

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<HealthServer<HealthService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .map_err(|e| Error::Reflection {
            reason: e.to_string(),
        })?;

    tracing::info!(addr = %local_addr, "gRPC server listening");

    Server::builder()
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_health_service(HealthService::new()))
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown.cancelled_owned(),
        )
        .await?;

    tracing::info!("gRPC server stopped");
    Ok(())
}

fn build_health_service(service: HealthService) -> HealthServer<HealthService> {
    HealthServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::net::SocketAddr;

    /// Starts a gRPC server on an ephemeral loopback port. Cancel the token to
    /// stop it.
    pub(crate) async fn spawn_grpc_server() -> (SocketAddr, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();
        tokio::spawn(serve(listener, token.clone()));
        (addr, token)
    }
}
