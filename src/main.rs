//! Process entry point: parses process-level overrides, loads the
//! config/state store, and serves the fixed HTTP route table until
//! SIGINT/SIGTERM, flushing any pending coalesced state write on the way
//! out (spec §5, SPEC_FULL §2).

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use algodomo_bridge::app::AppState;
use algodomo_bridge::gateway::{AddressLocks, GatewayClient};
use algodomo_bridge::http::build_router;
use algodomo_bridge::store::Store;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// algodomo-bridge — HTTP control API for an Algo_Domo v1.6 field bus.
#[derive(Parser, Debug)]
#[command(name = "algodomo-bridge", version, about, long_about = None)]
struct Args {
    /// Directory holding config.json and state.json.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory holding the static control/config HTML pages.
    #[arg(long, default_value = "web")]
    static_dir: PathBuf,

    /// HTTP listen port. Overrides the PORT environment variable, which in
    /// turn overrides the default of 8080 (spec §6).
    #[arg(long)]
    port: Option<u16>,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_port(cli_port: Option<u16>) -> u16 {
    if let Some(port) = cli_port {
        return port;
    }
    std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .map(|n| n.clamp(1, 65535) as u16)
        .unwrap_or(8080)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let store = Store::load(args.data_dir.clone()).await?;
    let gateway_settings = store.config().await.gateway;
    let gateway = Arc::new(GatewayClient::new(gateway_settings));
    let locks = Arc::new(AddressLocks::new());
    let state = AppState::new(store.clone(), gateway, locks, args.static_dir);

    let port = resolve_port(args.port);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("algodomo-bridge listening on http://{addr}");

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down, flushing pending state");
    store.flush_state_now().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
