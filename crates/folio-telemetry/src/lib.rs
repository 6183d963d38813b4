//! OpenTelemetry integration for folio.
//!
//! Provides the OTel tracing layer and a sampler with differentiated rates
//! for the sync engine's span categories.
//!
//! # Activation
//!
//! OTel export activates when standard OTel environment variables are set:
//!
//! ```bash
//! # Minimal: OTLP export to localhost:4317
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 cargo run -p folio-server
//!
//! # Full control
//! OTEL_SERVICE_NAME=folio \
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://jaeger:4317 \
//! OTEL_TRACES_EXPORTER=otlp \
//! cargo run -p folio-server
//! ```
//!
//! Set `OTEL_SDK_DISABLED=true` to explicitly disable even when the endpoint is set.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{OtelGuard, otel_layer};

/// Span names emitted by the sync engine, by category.
pub mod spans {
    /// A save through the adaptor.
    pub const ADAPTOR_SAVE: &str = "adaptor.save";
    /// A delete through the adaptor.
    pub const ADAPTOR_DELETE: &str = "adaptor.delete";
    /// One filesystem event handled by the watcher.
    pub const WATCHER_EVENT: &str = "watcher.event";
    /// One observer connection.
    pub const OBSERVER_CONNECTION: &str = "observer.connection";
}

/// Check whether OTel export should be enabled.
///
/// Returns `true` when standard OTel env vars indicate export is desired:
/// - `OTEL_SDK_DISABLED` is NOT set to `"true"`
/// - AND at least one of:
///   - `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///   - `OTEL_TRACES_EXPORTER` is set (and not `"none"`)
pub fn otel_enabled() -> bool {
    otel_enabled_with(|key| std::env::var(key).ok())
}

fn otel_enabled_with(var: impl Fn(&str) -> Option<String>) -> bool {
    // Explicit disable takes priority
    if var("OTEL_SDK_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return false;
    }

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        return true;
    }

    if let Some(exporter) = var("OTEL_TRACES_EXPORTER") {
        return !exporter.eq_ignore_ascii_case("none");
    }

    false
}
