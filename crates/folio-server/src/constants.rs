//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default port of the observer WebSocket endpoint.
pub const DEFAULT_WS_PORT: u16 = 8081;

/// Default bind address (localhost only).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Name of the configuration script.
pub const CONFIG_FILE_NAME: &str = "folio.rhai";

/// Directory under the platform data dir holding entries by default.
pub const DEFAULT_ROOT_DIR: &str = "folio/entries";

/// Service name reported to OpenTelemetry.
pub const SERVICE_NAME: &str = "folio";
