//! HTTP/JSON gateway in front of the gRPC server.
//!
//! The gateway owns a single client connection to the gRPC server, dialed once
//! when it is constructed, and exposes the static REST mapping declared in
//! [`grpc_setup_core::types`]. All responses pass through the CORS policy in
//! [`cors`].
//!
//! ## Submodules
//!
//! - [`cors`] - Origin echo and preflight short-circuit.
//! - [`error`] - gRPC code → HTTP status mapping and JSON error bodies.
//! - [`transcode`] - Route handlers and header/metadata translation.

pub mod cors;
pub mod error;
pub mod transcode;

use crate::server::{
    config::{GatewayOptions, JsonMarshaler, ServerConfig},
    telemetry::record_gateway_request,
};
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use grpc_setup_core::{
    Error, Result,
    proto::health_client::HealthClient,
    types::{Component, HEALTH_CHECK_PATH},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Per-request state shared by the route handlers.
#[derive(Clone)]
pub struct GatewayState {
    client: HealthClient<Channel>,
    marshaler: JsonMarshaler,
    max_request_body_size: usize,
}

/// A constructed gateway: a live client connection plus its options.
pub struct Gateway {
    state: GatewayState,
    options: GatewayOptions,
}

impl Gateway {
    /// Dials the gRPC server at `endpoint` (plaintext) and builds the gateway
    /// around that connection.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if `endpoint` is not a valid URI.
    /// - [`Error::GatewayConnect`] if the connection cannot be established
    ///   within `options.connect_timeout`.
    pub async fn connect(endpoint: &str, options: GatewayOptions) -> Result<Self> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|source| Error::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                source,
            })?
            .connect_timeout(options.connect_timeout)
            .connect()
            .await
            .map_err(|source| Error::GatewayConnect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        Ok(Self::with_channel(channel, options))
    }

    /// Builds the gateway around an existing channel.
    pub fn with_channel(channel: Channel, options: GatewayOptions) -> Self {
        Self {
            state: GatewayState {
                client: HealthClient::new(channel),
                marshaler: options.marshaler,
                max_request_body_size: options.max_request_body_size,
            },
            options,
        }
    }

    /// The routing table with every middleware applied.
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                HEALTH_CHECK_PATH,
                get(transcode::health_check).fallback(error::method_not_allowed),
            )
            .fallback(error::not_found)
            .with_state(self.state.clone())
            .layer(RequestBodyLimitLayer::new(self.options.max_request_body_size))
            .layer(middleware::from_fn(cors::allow_cors))
            .layer(middleware::from_fn(count_requests))
            .layer(TraceLayer::new_for_http())
    }

    /// Serves the gateway on an already-bound listener until it fails or
    /// `shutdown` is cancelled.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|source| Error::Serve {
                component: Component::Gateway,
                source,
            })
    }
}

/// Constructs the gateway against the gRPC server on `grpc_port` and serves
/// it on `listener`.
///
/// Construction runs in a child scope of `shutdown`: it is abandoned if the
/// process starts terminating first, and the scope is cancelled when
/// construction fails so the half-built connection is released before the
/// error is reported.
pub async fn run(
    config: &ServerConfig,
    grpc_port: u16,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<()> {
    let scope = shutdown.child_token();
    let endpoint = config.grpc_endpoint(grpc_port);

    let connected = tokio::select! {
        result = Gateway::connect(&endpoint, config.gateway.clone()) => result,
        () = scope.cancelled() => return Ok(()),
    };
    let gateway = match connected {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(endpoint = %endpoint, error = %e, "failed to construct gateway");
            scope.cancel();
            return Err(e);
        }
    };

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, endpoint = %endpoint, "gateway listening");
    }
    gateway.serve(listener, scope).await
}

async fn count_requests(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    record_gateway_request(response.status().as_u16());
    response
}
