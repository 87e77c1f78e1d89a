use clap::{ArgAction, Parser, ValueEnum, builder::FalseyValueParser};
use core::time::Duration;
use grpc_setup_core::{Error, Result};

/// Default upper bound on a gateway request body (4 MiB, the gRPC default
/// message size).
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Host the gateway dials when `GRPC_HOST` is empty.
const LOOPBACK_HOST: &str = "127.0.0.1";

/// Host a listener binds when the address is given as `:port`.
const UNSPECIFIED_HOST: &str = "0.0.0.0";

/// Runtime configuration for the `grpc-setup-server` binary.
///
/// Every setting is read from the environment (a `.env` file is loaded first
/// when present) and can be overridden with the matching long flag. The
/// defaults start both listeners on all interfaces with the gateway dialing
/// the gRPC server over loopback.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "grpc-setup-server",
    version,
    about = "A gRPC health service with an HTTP/JSON transcoding gateway"
)]
pub struct CliArgs {
    /// Address the HTTP gateway listens on.
    ///
    /// Either `host:port` or `:port`, the latter binding all interfaces.
    ///
    /// Environment variable: `API_PORT`
    #[arg(long, env = "API_PORT", default_value_t = String::from(":8080"))]
    pub api_port: String,

    /// Host the gateway dials to reach the gRPC server. Empty means loopback.
    ///
    /// Environment variable: `GRPC_HOST`
    #[arg(long, env = "GRPC_HOST", default_value_t = String::new())]
    pub grpc_host: String,

    /// Port the gRPC server binds on all interfaces, with or without a
    /// leading colon (`:9090` or `9090`).
    ///
    /// Environment variable: `GRPC_PORT`
    #[arg(long, env = "GRPC_PORT", default_value_t = String::from(":9090"))]
    pub grpc_port: String,

    /// Log at `debug` instead of `info`.
    ///
    /// Environment variable: `DEBUG_LOGGING`
    #[arg(
        long,
        env = "DEBUG_LOGGING",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub debug_logging: bool,

    /// Largest request body, in bytes, the gateway accepts before answering
    /// `413 Payload Too Large`.
    ///
    /// Environment variable: `MAX_REQUEST_BODY_SIZE`
    #[arg(long, env = "MAX_REQUEST_BODY_SIZE", default_value_t = DEFAULT_MAX_REQUEST_BODY_SIZE)]
    pub max_request_body_size: usize,

    /// How the gateway writes RPC responses as JSON.
    ///
    /// Environment variable: `JSON_MARSHALER`
    #[arg(long, env = "JSON_MARSHALER", value_enum, default_value_t = JsonMarshaler::Compact)]
    pub json_marshaler: JsonMarshaler,

    /// How long the gateway waits to establish its gRPC client connection at
    /// startup, in milliseconds.
    ///
    /// Environment variable: `GATEWAY_CONNECT_TIMEOUT_MS`
    #[arg(long, env = "GATEWAY_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub gateway_connect_timeout_ms: u64,
}

/// JSON encoding used for gateway response bodies.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMarshaler {
    /// Single-line JSON, e.g. `{"status":"OK"}`.
    Compact,
    /// Pretty-printed JSON with two-space indentation.
    Indented,
}

/// Options applied when the gateway is constructed.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub max_request_body_size: usize,
    pub marshaler: JsonMarshaler,
    pub connect_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            marshaler: JsonMarshaler::Compact,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Validated process configuration, built once in `main` and passed by
/// reference to both servers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the gateway binds, normalized to `host:port`.
    pub rest_addr: String,
    /// Address the gRPC server binds, normalized to `host:port`.
    pub grpc_addr: String,
    /// Host the gateway dials. Empty means loopback.
    pub grpc_host: String,
    pub debug_logging: bool,
    pub gateway: GatewayOptions,
}

impl ServerConfig {
    /// URI the gateway dials for a gRPC server listening on `port`.
    ///
    /// The port is passed in rather than read from the config so that a
    /// server bound to port `0` is dialed on the port it actually got.
    pub fn grpc_endpoint(&self, port: u16) -> String {
        let host = match self.grpc_host.trim() {
            "" => LOOPBACK_HOST,
            host => host,
        };
        if host.contains(':') && !host.starts_with('[') {
            format!("http://[{host}]:{port}")
        } else {
            format!("http://{host}:{port}")
        }
    }

    /// Default log directive for the configured verbosity.
    pub const fn log_level(&self) -> &'static str {
        if self.debug_logging { "debug" } else { "info" }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = Error;

    fn try_from(args: CliArgs) -> Result<Self> {
        if args.max_request_body_size == 0 {
            return Err(invalid("MAX_REQUEST_BODY_SIZE must be greater than 0"));
        }

        if args.gateway_connect_timeout_ms == 0 {
            return Err(invalid("GATEWAY_CONNECT_TIMEOUT_MS must be greater than 0"));
        }

        let grpc_port = args.grpc_port.trim();
        let grpc_port = parse_port(grpc_port.strip_prefix(':').unwrap_or(grpc_port), "GRPC_PORT")?;

        Ok(Self {
            rest_addr: listen_addr(&args.api_port, "API_PORT")?,
            grpc_addr: format!("{UNSPECIFIED_HOST}:{grpc_port}"),
            grpc_host: args.grpc_host.trim().to_string(),
            debug_logging: args.debug_logging,
            gateway: GatewayOptions {
                max_request_body_size: args.max_request_body_size,
                marshaler: args.json_marshaler,
                connect_timeout: Duration::from_millis(args.gateway_connect_timeout_ms),
            },
        })
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        reason: reason.into(),
    }
}

fn parse_port(raw: &str, name: &str) -> Result<u16> {
    raw.parse::<u16>()
        .map_err(|_| invalid(format!("{name} has an invalid port: {raw:?}")))
}

/// Normalizes `host:port` / `:port` into a bindable `host:port`.
fn listen_addr(raw: &str, name: &str) -> Result<String> {
    let raw = raw.trim();
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| invalid(format!("{name} must be host:port or :port, got {raw:?}")))?;
    let port = parse_port(port, name)?;
    let host = if host.is_empty() { UNSPECIFIED_HOST } else { host };
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn args() -> CliArgs {
        CliArgs {
            api_port: ":8080".to_string(),
            grpc_host: String::new(),
            grpc_port: ":9090".to_string(),
            debug_logging: false,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            json_marshaler: JsonMarshaler::Compact,
            gateway_connect_timeout_ms: 5_000,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn leading_colon_binds_all_interfaces() {
        let config = ServerConfig::try_from(args()).unwrap();
        assert_eq!(config.rest_addr, "0.0.0.0:8080");
        assert_eq!(config.grpc_addr, "0.0.0.0:9090");
    }

    #[test]
    fn grpc_port_without_colon_is_accepted() {
        let config = ServerConfig::try_from(CliArgs {
            grpc_port: "50051".to_string(),
            ..args()
        })
        .unwrap();
        assert_eq!(config.grpc_addr, "0.0.0.0:50051");
    }

    #[test]
    fn explicit_rest_host_is_kept() {
        let config = ServerConfig::try_from(CliArgs {
            api_port: "127.0.0.1:3000".to_string(),
            ..args()
        })
        .unwrap();
        assert_eq!(config.rest_addr, "127.0.0.1:3000");
    }

    #[test]
    fn malformed_ports_are_rejected() {
        for (api_port, grpc_port) in [
            (":8080", ":http"),
            (":8080", ":70000"),
            ("8080", ":9090"),
            (":", ":9090"),
        ] {
            let result = ServerConfig::try_from(CliArgs {
                api_port: api_port.to_string(),
                grpc_port: grpc_port.to_string(),
                ..args()
            });
            assert!(
                matches!(result, Err(Error::InvalidConfig { .. })),
                "{api_port} / {grpc_port} should be rejected"
            );
        }
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(
            ServerConfig::try_from(CliArgs {
                max_request_body_size: 0,
                ..args()
            })
            .is_err()
        );
        assert!(
            ServerConfig::try_from(CliArgs {
                gateway_connect_timeout_ms: 0,
                ..args()
            })
            .is_err()
        );
    }

    #[test]
    fn empty_grpc_host_dials_loopback() {
        let config = ServerConfig::try_from(args()).unwrap();
        assert_eq!(config.grpc_endpoint(9090), "http://127.0.0.1:9090");
    }

    #[test]
    fn grpc_host_is_used_for_dialing() {
        let config = ServerConfig::try_from(CliArgs {
            grpc_host: "grpc.internal".to_string(),
            ..args()
        })
        .unwrap();
        assert_eq!(config.grpc_endpoint(9090), "http://grpc.internal:9090");

        let config = ServerConfig::try_from(CliArgs {
            grpc_host: "::1".to_string(),
            ..args()
        })
        .unwrap();
        assert_eq!(config.grpc_endpoint(9090), "http://[::1]:9090");
    }

    #[test]
    fn debug_flag_selects_log_level() {
        let config = ServerConfig::try_from(args()).unwrap();
        assert_eq!(config.log_level(), "info");

        let config = ServerConfig::try_from(CliArgs {
            debug_logging: true,
            ..args()
        })
        .unwrap();
        assert_eq!(config.log_level(), "debug");
    }
}
