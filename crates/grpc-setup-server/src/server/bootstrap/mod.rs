//! Process bootstrap and lifetime coordination.
//!
//! This is the only place that knows about both servers. Startup is
//! all-or-nothing: both listeners are bound before either server runs, gRPC
//! first, so a taken gRPC port means the HTTP port is never opened. After that
//! the two servers run side by side and the first one to stop ends the
//! process (see [`coordinator::coordinate`]).
//!
//! ```text
//! starting ──bind both──▶ both-serving ──first outcome / signal──▶ terminating ──▶ exited
//! ```

pub mod coordinator;

use crate::server::{config::ServerConfig, gateway, service};
use grpc_setup_core::{Error, Result, types::Component};
use std::{future::Future, net::SocketAddr};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

/// The two bound, not yet serving, listeners.
pub struct Listeners {
    grpc: TcpListener,
    rest: TcpListener,
}

impl Listeners {
    /// Binds the gRPC listener, then the REST listener.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] for the first listener that cannot be bound. Nothing is
    /// left bound when this fails.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let grpc = bind(Component::Grpc, &config.grpc_addr).await?;
        let rest = bind(Component::Gateway, &config.rest_addr).await?;
        Ok(Self { grpc, rest })
    }

    /// Address the gRPC server is bound to.
    pub fn grpc_addr(&self) -> Result<SocketAddr> {
        local_addr(Component::Grpc, &self.grpc)
    }

    /// Address the gateway is bound to.
    pub fn rest_addr(&self) -> Result<SocketAddr> {
        local_addr(Component::Gateway, &self.rest)
    }
}

async fn bind(component: Component, addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| Error::Bind {
        component,
        addr: addr.to_string(),
        source,
    })
}

fn local_addr(component: Component, listener: &TcpListener) -> Result<SocketAddr> {
    listener
        .local_addr()
        .map_err(|source| Error::Serve { component, source })
}

/// Binds both listeners and serves until either server fails or the process
/// receives SIGINT/SIGTERM.
pub async fn run(config: &ServerConfig) -> Result<()> {
    let listeners = Listeners::bind(config).await?;
    serve(config, listeners, shutdown_signal()).await
}

/// Serves on already-bound listeners until the first server stops or
/// `shutdown` resolves.
///
/// The gateway dials the gRPC server on the port its listener actually got,
/// so binding to port `0` works.
pub async fn serve<S>(config: &ServerConfig, listeners: Listeners, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let grpc_addr = listeners.grpc_addr()?;
    let rest_addr = listeners.rest_addr()?;
    tracing::debug!(grpc = %grpc_addr, rest = %rest_addr, "listeners bound");

    let grpc_port = grpc_addr.port();
    let Listeners { grpc, rest } = listeners;

    let token = CancellationToken::new();
    let _cancel_on_exit = token.clone().drop_guard();

    let grpc_server = service::grpc::serve(grpc, token.child_token());
    let gateway_server = {
        let config = config.clone();
        let token = token.child_token();
        async move { gateway::run(&config, grpc_port, rest, token).await }
    };

    coordinator::coordinate(grpc_server, gateway_server, shutdown).await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
