use std::sync::Arc;

use paperlink_config::AppConfig;
use paperlink_db::Store;

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Store>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<Store>) -> Self {
        Self { config, store }
    }

    /// Backup directory resolved from config.
    pub fn backup_dir(&self) -> std::path::PathBuf {
        self.config.backup_dir()
    }
}

pub type SharedState = Arc<AppState>;
