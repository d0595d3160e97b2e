//! Process-wide shared state threaded through every HTTP handler: the
//! config/state store, the gateway client, the per-address lock registry,
//! and the data needed for the diagnostics endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::gateway::{AddressLocks, GatewayClient};
use crate::store::Store;

/// Shared application state, cloned cheaply into every axum handler
/// (everything inside is an `Arc`, `PathBuf`, or `Copy`).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub gateway: Arc<GatewayClient>,
    pub locks: Arc<AddressLocks>,
    pub static_dir: Arc<PathBuf>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<GatewayClient>,
        locks: Arc<AddressLocks>,
        static_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            gateway,
            locks,
            static_dir: Arc::new(static_dir),
            started_at: Instant::now(),
        }
    }
}
