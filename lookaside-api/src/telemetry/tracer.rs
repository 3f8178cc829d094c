//! OpenTelemetry Tracer Initialization
//!
//! Sets up an OTLP exporter for distributed tracing compatible with:
//! - Jaeger
//! - Grafana Tempo
//! - Any OTLP-compatible backend
//!
//! Without an endpoint, spans are still created so trace ids propagate, but
//! nothing is exported.

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_LOG_FILTER: &str = "lookaside_api=debug,lookaside_storage=debug,tower_http=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces (e.g., "http://localhost:4318/v1/traces")
    pub otlp_endpoint: Option<String>,
    /// Service name for traces
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Trace sampling ratio (0.0 to 1.0)
    pub trace_sample_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl TelemetryConfig {
    /// Read the configuration from the process environment.
    ///
    /// - `LOOKASIDE_OTLP_ENDPOINT`: export target (unset = no export)
    /// - `LOOKASIDE_SERVICE_NAME` (default: lookaside-api)
    /// - `LOOKASIDE_SERVICE_VERSION` (default: crate version)
    /// - `LOOKASIDE_ENVIRONMENT` (default: development)
    /// - `LOOKASIDE_TRACE_SAMPLE_RATE` (default: 1.0)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            otlp_endpoint: lookup("LOOKASIDE_OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            service_name: lookup("LOOKASIDE_SERVICE_NAME")
                .unwrap_or_else(|| "lookaside-api".to_string()),
            service_version: lookup("LOOKASIDE_SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            environment: lookup("LOOKASIDE_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
            trace_sample_rate: lookup("LOOKASIDE_TRACE_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
        }
    }

    /// Sampler matching the configured rate.
    pub fn sampler(&self) -> Sampler {
        if self.trace_sample_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.trace_sample_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.trace_sample_rate)
        }
    }
}

/// Owns the tracer provider; call [`TracerGuard::shutdown`] before exit to
/// flush pending spans.
pub struct TracerGuard {
    provider: SdkTracerProvider,
}

impl TracerGuard {
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Tracer shutdown failed");
            return;
        }
        tracing::info!("Tracer shutdown complete");
    }
}

/// Initialize the OpenTelemetry tracer and tracing subscriber.
///
/// Call once at startup before any tracing occurs. Sets up:
/// - OTLP exporter for distributed traces (if endpoint configured)
/// - TraceContext propagation (W3C traceparent header)
/// - JSON tracing-subscriber output with an OpenTelemetry layer
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<TracerGuard> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build();

    let mut builder = SdkTracerProvider::builder()
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to create OTLP exporter: {}", e))
            })?;
        builder = builder.with_batch_exporter(exporter);
    }

    let provider = builder.build();
    let tracer = provider.tracer("lookaside-api");
    global::set_tracer_provider(provider.clone());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        environment = config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        "Telemetry initialized"
    );

    Ok(TracerGuard { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "lookaside-api");
        assert_eq!(config.environment, "development");
        assert_eq!(config.trace_sample_rate, 1.0);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_empty_endpoint_disables_export() {
        let config = TelemetryConfig::from_lookup(|key| match key {
            "LOOKASIDE_OTLP_ENDPOINT" => Some(String::new()),
            _ => None,
        });
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_sampler_selection() {
        let with_rate = |rate: f64| TelemetryConfig {
            trace_sample_rate: rate,
            ..Default::default()
        };

        assert!(matches!(with_rate(1.0).sampler(), Sampler::AlwaysOn));
        assert!(matches!(with_rate(0.0).sampler(), Sampler::AlwaysOff));
        assert!(matches!(
            with_rate(0.25).sampler(),
            Sampler::TraceIdRatioBased(r) if (r - 0.25).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn test_unparseable_rate_defaults_to_always_on() {
        let config = TelemetryConfig::from_lookup(|key| match key {
            "LOOKASIDE_TRACE_SAMPLE_RATE" => Some("often".to_string()),
            _ => None,
        });
        assert!(matches!(config.sampler(), Sampler::AlwaysOn));
    }
}
