//! Process telemetry: `tracing` setup with optional OTLP span export.
//!
//! [`init_tracing`] is called once, at the top of `main`, before any thread
//! is spawned. Behaviour is driven entirely by environment variables:
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `SWARMOS_LOG_FORMAT=json` | Newline-delimited JSON logs instead of the compact console format. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`); enables span export over OTLP/HTTP. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = swarmos_runtime::telemetry::init_tracing("swarmos");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// Spans go to the console always, and to an OTLP collector as well when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set. The returned guard flushes pending
/// span batches on drop, so it must outlive everything that traces.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
    });

    let fmt_layer: Box<dyn Layer<_> + Send + Sync> =
        if std::env::var("SWARMOS_LOG_FORMAT").as_deref() == Ok("json") {
            Box::new(tracing_subscriber::fmt::layer().json())
        } else {
            Box::new(tracing_subscriber::fmt::layer().compact())
        };

    let provider = otlp_provider(service_name);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("swarmos")));

    Registry::default()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .init();

    TracerProviderGuard(provider)
}

/// Shuts the OTel provider down on drop, flushing any spans still queued.
/// Keep one alive in `main` for the whole run.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[swarmos] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// `Some` only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set and the exporter
/// comes up; an exporter failure is reported to stderr and the process keeps
/// running with console logs only.
fn otlp_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[swarmos] OTLP exporter init failed: {e}"))
        .ok()?;
    Some(
        SdkTracerProvider::builder()
            .with_resource(
                Resource::builder()
                    .with_service_name(service_name.to_string())
                    .build(),
            )
            // Simple exporter on purpose: a batch exporter spawns onto a
            // Tokio runtime, and none exists this early in startup.
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_means_no_provider() {
        // SAFETY: single-threaded test; no other thread reads this env-var.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(otlp_provider("test-service").is_none());
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        drop(TracerProviderGuard(None));
    }
}
