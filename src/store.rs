//! The config/state store (C4): load, normalise, atomic persistence and
//! coalesced state writes.

pub mod normalize;
pub mod persist;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tracing::warn;

use crate::core::error::Result;
use crate::core::model::{
    now_ms, BoardSnapshot, Configuration, DerivedLightState, DerivedShutterState,
    DerivedThermostatState, State,
};
use normalize::normalize_configuration;
use persist::{read_value, write_atomic};

/// How long a state mutation waits before the coalesced flush fires.
const FLUSH_DELAY: Duration = Duration::from_millis(200);

/// Holds the live configuration and state documents and persists them to
/// `<data_dir>/config.json` and `<data_dir>/state.json`.
pub struct Store {
    data_dir: PathBuf,
    config: RwLock<Configuration>,
    state: RwLock<State>,
    flush_pending: AtomicBool,
    flush_notify: Notify,
}

impl Store {
    /// Create the data directory if absent, seed defaults, load and
    /// normalise both documents, and start the background flusher.
    pub async fn load(data_dir: PathBuf) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let config_path = data_dir.join("config.json");
        let state_path = data_dir.join("state.json");

        let config_raw = read_value(&config_path)
            .await?
            .unwrap_or_else(|| serde_json::json!({}));
        let config = normalize_configuration(&config_raw);

        let state = match read_value(&state_path).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => State::default(),
        };

        let store = Arc::new(Self {
            data_dir,
            config: RwLock::new(config),
            state: RwLock::new(state),
            flush_pending: AtomicBool::new(false),
            flush_notify: Notify::new(),
        });

        // Seed config.json/state.json on disk if either was absent or stale.
        store.persist_config_now().await?;
        store.flush_state_now().await?;

        store.clone().spawn_flusher();
        Ok(store)
    }

    fn spawn_flusher(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                self.flush_notify.notified().await;
                tokio::time::sleep(FLUSH_DELAY).await;
                self.flush_pending.store(false, Ordering::SeqCst);
                if let Err(err) = self.flush_state_now().await {
                    warn!(error = %err, "coalesced state flush failed");
                }
            }
        });
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub async fn config(&self) -> Configuration {
        self.config.read().await.clone()
    }

    pub async fn state(&self) -> State {
        self.state.read().await.clone()
    }

    /// Replace the whole configuration document and persist it
    /// immediately (configuration is never coalesced: it is
    /// user-authoritative and POSTed explicitly).
    pub async fn replace_config(&self, raw: serde_json::Value) -> Result<Configuration> {
        let normalized = normalize_configuration(&raw);
        {
            let mut guard = self.config.write().await;
            *guard = normalized.clone();
        }
        self.persist_config_now().await?;
        Ok(normalized)
    }

    async fn persist_config_now(&self) -> Result<()> {
        let snapshot = self.config.read().await.clone();
        write_atomic(&self.config_path(), &snapshot).await
    }

    pub async fn put_snapshot(&self, snapshot: BoardSnapshot) {
        {
            let mut guard = self.state.write().await;
            guard.put_snapshot(snapshot);
            guard.updated_at = now_ms();
        }
        self.mark_dirty();
    }

    pub async fn put_light_state(&self, id: &str, derived: DerivedLightState) {
        {
            let mut guard = self.state.write().await;
            guard.lights.insert(id.to_string(), derived);
            guard.updated_at = now_ms();
        }
        self.mark_dirty();
    }

    pub async fn put_shutter_state(&self, id: &str, derived: DerivedShutterState) {
        {
            let mut guard = self.state.write().await;
            guard.shutters.insert(id.to_string(), derived);
            guard.updated_at = now_ms();
        }
        self.mark_dirty();
    }

    pub async fn put_thermostat_state(&self, id: &str, derived: DerivedThermostatState) {
        {
            let mut guard = self.state.write().await;
            guard.thermostats.insert(id.to_string(), derived);
            guard.updated_at = now_ms();
        }
        self.mark_dirty();
    }

    fn mark_dirty(&self) {
        if !self.flush_pending.swap(true, Ordering::SeqCst) {
            self.flush_notify.notify_one();
        }
    }

    /// Flush the state document unconditionally, bypassing the coalescing
    /// window. Used on graceful shutdown so a restart never loses the
    /// last mutation.
    pub async fn flush_state_now(&self) -> Result<()> {
        let snapshot = self.state.read().await.clone();
        write_atomic(&self.state_path(), &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn load_seeds_defaults_when_absent() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(store.config().await.gateway.port, 1470);
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn replace_config_persists_immediately() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).await.unwrap();
        store
            .replace_config(serde_json::json!({"apiToken": "secret"}))
            .await
            .unwrap();
        let raw = tokio::fs::read_to_string(dir.path().join("config.json"))
            .await
            .unwrap();
        assert!(raw.contains("\"secret\""));
    }

    #[tokio::test]
    async fn state_mutation_is_eventually_flushed() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).await.unwrap();
        store
            .put_light_state(
                "light-1",
                DerivedLightState {
                    is_on: Some(true),
                    updated_at: now_ms(),
                },
            )
            .await;

        tokio::time::sleep(Duration::from_millis(350)).await;
        let raw = tokio::fs::read_to_string(dir.path().join("state.json"))
            .await
            .unwrap();
        assert!(raw.contains("\"light-1\""));
    }
}
