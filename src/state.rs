//! Application state management
//! Holds the loaded configuration and the running session.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::core::bluetooth::{SessionHandle, start_bluest_session};

/// Global application state
pub struct AppState {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub session: SessionHandle,
    session_task: JoinHandle<()>,
}

impl AppState {
    /// Loads the config at `config_path` and starts a session on the default adapter.
    pub async fn new(config_path: &Path) -> Result<Self> {
        let config = AppConfig::load_config(config_path).await?;
        info!("Initializing BluetoothManager...");
        let (session, session_task) = start_bluest_session(&config).await?;
        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            session,
            session_task,
        })
    }

    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Ends the session and waits for its loop to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.session.shutdown().await?;
        self.session_task.await?;
        info!("Session closed");
        Ok(())
    }
}
