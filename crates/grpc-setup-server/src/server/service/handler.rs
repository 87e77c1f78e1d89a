//! gRPC service implementation for the process health probe.
//!
//! This module defines [`HealthService`], the concrete implementation of the
//! [`Health`] gRPC service defined in `proto/health.proto`. The probe is a
//! liveness check only: it performs no I/O, touches no dependency and always
//! reports [`STATUS_OK`](grpc_setup_core::types::STATUS_OK).

use crate::server::telemetry::increment_health_checks;
use grpc_setup_core::proto::{HealthStatus, health_server::Health};
use tonic::{Request, Response, Status};

/// Stateless implementation of `proto.Health`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealthService;

impl HealthService {
    pub const fn new() -> Self {
        Self
    }
}

#[tonic::async_trait]
impl Health for HealthService {
    /// Answers `{status: "OK"}` for every request. The request carries no
    /// fields and is ignored.
    #[tracing::instrument(skip_all, level = "debug")]
    async fn health_check(&self, _req: Request<()>) -> Result<Response<HealthStatus>, Status> {
        increment_health_checks();
        tracing::debug!("health check");
        Ok(Response::new(HealthStatus::ok()))
    }
}
