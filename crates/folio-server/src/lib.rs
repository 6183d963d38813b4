//! # folio-server
//!
//! Runs a sync engine over one directory and pushes external changes to
//! WebSocket observers.
//!
//! - [`config`]: `folio.rhai` loading and conversion to engine config
//! - [`observer`]: the `/` WebSocket endpoint
//! - [`constants`]: ports, addresses, file names

pub mod config;
pub mod constants;
pub mod observer;

pub use config::{DEFAULT_SERVER_CONFIG, ServerConfig, TypeOverride, load_server_config};
pub use observer::{ObserverState, pump_updates, router, serve};
