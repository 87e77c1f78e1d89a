//! # Logging and Telemetry
//!
//! Structured JSON logs to stdout are always on. The default level comes from
//! the `DEBUG_LOGGING` setting (`debug` or `info`); `RUST_LOG`, when set,
//! overrides it.
//!
//! OpenTelemetry export is opt-in through cargo features:
//!
//! - `otel-trace`: spans exported over OTLP/gRPC.
//! - `otel-metrics`: health-check and gateway request counters exported over
//!   OTLP/gRPC.
//! - `otel-stdout`: the same data printed by the stdout exporters instead of
//!   (or in addition to) OTLP.
//!
//! The OTLP exporters read the standard `OTEL_EXPORTER_OTLP_*` environment
//! variables.
//!
//! ```bash
//! cargo run --features otel-trace,otel-metrics
//! cargo run --features otel-trace,otel-stdout
//! ```
//!
//! Without `otel-metrics` the recording helpers compile to no-ops.

// Disallow using `otel-stdout` without something to export
#[cfg(all(
    feature = "otel-stdout",
    not(any(feature = "otel-trace", feature = "otel-metrics"))
))]
compile_error!(
    "The 'otel-stdout' feature requires at least one of 'otel-trace' or 'otel-metrics' to be enabled."
);

use crate::server::config::ServerConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Either
#[cfg(any(feature = "otel-metrics", feature = "otel-trace"))]
use opentelemetry::KeyValue;
#[cfg(any(feature = "otel-metrics", feature = "otel-trace"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "otel-metrics", feature = "otel-trace"))]
use opentelemetry_semantic_conventions as semvcns;

// Metrics-specific imports
#[cfg(feature = "otel-metrics")]
use opentelemetry::metrics::{Counter, Meter};
#[cfg(feature = "otel-metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "otel-metrics")]
use std::sync::OnceLock;

// Tracing-specific imports
#[cfg(feature = "otel-trace")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel-trace")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "otel-trace")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "grpc-setup";

/// Exporter handles that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "otel-trace")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "otel-metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_telemetry(config: &ServerConfig) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "otel-trace")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "otel-trace")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "otel-metrics")]
    let meter_provider = init_metrics()?;

    let registry = tracing_subscriber::registry()
        .with(env_filter(config.log_level()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stdout)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_current_span(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        );

    #[cfg(feature = "otel-trace")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer(SERVICE_NAME))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "otel-metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        init_metric_handles(opentelemetry::global::meter(SERVICE_NAME));
        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    tracing::info!(level = config.log_level(), "logging level set");

    Ok(TelemetryProviders {
        #[cfg(feature = "otel-trace")]
        tracer_provider,
        #[cfg(feature = "otel-metrics")]
        meter_provider,
    })
}

impl TelemetryProviders {
    /// Flushes and shuts down every exporter. Errors go to stderr since the
    /// subscriber may already be unusable.
    pub fn shutdown(self) {
        #[cfg(feature = "otel-trace")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "otel-metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// `RUST_LOG` when set, otherwise `default_level`.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(any(feature = "otel-metrics", feature = "otel-trace"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "otel-trace")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    use anyhow::Context;

    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "otel-stdout")]
    let builder = builder.with_batch_exporter(opentelemetry_stdout::SpanExporter::default());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .context("failed to build span exporter")?;

    Ok(builder.with_batch_exporter(exporter).build())
}

#[cfg(feature = "otel-metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    use anyhow::Context;

    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "otel-stdout")]
    let builder = builder.with_periodic_exporter(opentelemetry_stdout::MetricExporter::default());

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()
        .context("failed to build metrics exporter")?;

    Ok(builder.with_periodic_exporter(exporter).build())
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "otel-metrics")]
static HEALTH_CHECKS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "otel-metrics")]
static GATEWAY_REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "otel-metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = HEALTH_CHECKS.set(
        meter
            .u64_counter("health_checks")
            .with_description("HealthCheck RPCs answered")
            .build(),
    );

    let _ = GATEWAY_REQUESTS.set(
        meter
            .u64_counter("gateway_requests")
            .with_description("HTTP requests answered by the gateway")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "otel-metrics")]
pub fn increment_health_checks() {
    if let Some(counter) = HEALTH_CHECKS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "otel-metrics"))]
pub fn increment_health_checks() {}

#[cfg(feature = "otel-metrics")]
pub fn record_gateway_request(status: u16) {
    if let Some(counter) = GATEWAY_REQUESTS.get() {
        counter.add(1, &[KeyValue::new("http.response.status_code", i64::from(status))]);
    }
}

#[cfg(not(feature = "otel-metrics"))]
pub fn record_gateway_request(_status: u16) {}
