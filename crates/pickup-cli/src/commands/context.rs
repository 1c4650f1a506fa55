use anyhow::{Context, Result};
use pickup_core::{SessionManager, SystemClock};
use pickup_infrastructure::{ClientConfig, FileDurableStore, PickupPaths};
use pickup_remote::HttpPickupBackend;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything a command needs: resolved configuration and a wired manager.
pub struct AppContext {
    pub config: ClientConfig,
    pub manager: SessionManager,
    /// Cancelling this aborts in-flight backend requests.
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn bootstrap(config_path: Option<&Path>) -> Result<Self> {
        let paths = PickupPaths::default();
        let config = ClientConfig::load(config_path, &paths).context("Failed to load config")?;

        let storage_dir = match &config.storage_dir {
            Some(dir) => dir.clone(),
            None => paths.data_dir().context("Failed to resolve data directory")?,
        };
        debug!(
            "[Cli] base_url={} storage={}",
            config.base_url,
            storage_dir.display()
        );

        let shutdown = CancellationToken::new();
        let backend = HttpPickupBackend::from_config(&config).with_shutdown(shutdown.child_token());
        let manager = SessionManager::with_settings(
            Arc::new(SystemClock),
            Arc::new(FileDurableStore::new(storage_dir)),
            Arc::new(backend),
            config.session_settings(),
        );

        Ok(Self {
            config,
            manager,
            shutdown,
        })
    }

    /// Loads the stored session; commands that act on a session need one.
    pub async fn require_session(&mut self) -> Result<()> {
        if !self.manager.load().await {
            anyhow::bail!("No active session. Run `pickup login` first.");
        }
        Ok(())
    }
}
