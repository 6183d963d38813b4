//! folio binary
//!
//! Keeps a directory of entry files in sync with an in-memory collection
//! and pushes external edits to WebSocket observers.
//!
//! ## Usage
//!
//! ```bash
//! # Watch the default directory with the default config
//! folio
//!
//! # Watch ~/notes, observers on port 9000
//! folio --root ~/notes --port 9000
//!
//! # Explicit config script, no observer endpoint
//! folio --config ./folio.rhai --no-notify
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use folio_kernel::{MemoryEntryStore, NotificationChannel, SyncEngine, TidRenderer, shared_entry_flow_bus};
use folio_server::config::{DEFAULT_SERVER_CONFIG, ServerConfig, expand_path, load_server_config};
use folio_server::constants::CONFIG_FILE_NAME;

/// Capacity of the flow bus shared by the engine and the observer endpoint.
const FLOW_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Two-way sync between an entry collection and a directory of files")]
struct Args {
    /// Directory holding one file per entry (overrides `root` in the config)
    #[arg(short, long)]
    root: Option<String>,

    /// Config script (default: <config dir>/folio/folio.rhai if present, else built-in)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Observer bind address
    #[arg(long)]
    bind: Option<String>,

    /// Observer WebSocket port
    #[arg(long)]
    port: Option<u16>,

    /// Do not serve the observer endpoint
    #[arg(long)]
    no_notify: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "telemetry")]
    let _otel_guard = if folio_telemetry::otel_enabled() {
        match folio_telemetry::otel_layer(folio_server::constants::SERVICE_NAME) {
            Ok((otel_layer, guard)) => {
                registry.with(otel_layer).init();
                Some(guard)
            }
            Err(e) => {
                registry.init();
                tracing::warn!(error = %e, "OTel export unavailable");
                None
            }
        }
    } else {
        registry.init();
        None
    };
    #[cfg(not(feature = "telemetry"))]
    registry.init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Read the config script and apply command-line overrides.
fn resolve_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let user_config = dirs::config_dir()
        .map(|dir| dir.join("folio").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file());

    let script = match args.config.as_ref().or(user_config.as_ref()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?
        }
        None => DEFAULT_SERVER_CONFIG.to_string(),
    };

    let mut config = load_server_config(&script).map_err(anyhow::Error::msg)?;
    if let Some(root) = &args.root {
        config.root = expand_path(root);
    }
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_notify {
        config.notifications = false;
    }
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let sync_config = config.sync_config().map_err(anyhow::Error::msg)?;

    let bus = shared_entry_flow_bus(FLOW_CAPACITY);
    let notifier = config
        .notifications
        .then(|| NotificationChannel::new(Arc::clone(&bus)));

    let store = Arc::new(MemoryEntryStore::new());
    let engine = SyncEngine::open_with(sync_config, store.clone(), Arc::new(TidRenderer), notifier)
        .await
        .context("opening entry directory")?;
    tracing::info!(
        path = %engine.root().display(),
        entries = store.len(),
        "Starting folio"
    );

    let watcher = engine.start_watching().await.context("starting watcher")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let observer = if config.notifications {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding observer endpoint {addr}"))?;
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        Some(tokio::spawn(folio_server::serve(listener, Arc::clone(&bus), shutdown)))
    } else {
        None
    };

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");

    watcher.stop();
    let _ = shutdown_tx.send(());
    if let Some(observer) = observer {
        observer
            .await
            .context("observer task")?
            .context("observer endpoint")?;
    }
    Ok(())
}
