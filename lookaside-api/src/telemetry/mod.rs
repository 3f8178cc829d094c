//! Lookaside Telemetry - Observability Infrastructure
//!
//! Provides OpenTelemetry tracing and Prometheus metrics for the API layer.
//! Everything works standalone; an OTLP collector is optional.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, ApiMetrics};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, TelemetryConfig, TracerGuard};
