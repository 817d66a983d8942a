use std::sync::Arc;

use paperlink_common::{Error, Result};
use paperlink_config::AppConfig;
use paperlink_db::Store;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;
use crate::state::AppState;

/// The main gateway server that binds to a port and serves the JSON API.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        let store = self.open_store()?;
        if self.config.admin.token.is_none() {
            warn!("no admin token configured, admin API is disabled");
        }

        let state = Arc::new(AppState::new(self.config, store));
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("paperlink gateway listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Gateway(format!("server error: {e}")))?;

        Ok(())
    }

    fn open_store(&self) -> Result<Arc<Store>> {
        let data_dir = self.config.data_dir();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            Error::Config(format!(
                "failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;

        let db_path = self.config.database_path();
        let store = Store::open(&db_path)?;
        info!("database opened at {}", db_path.display());
        Ok(Arc::new(store))
    }
}
