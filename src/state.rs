use crate::config::{AppConfig, DashboardConfig};
use crate::store::{KitchenStore, MemoryStore, PgStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KitchenStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = PgStore::connect(&config.database_url, config.max_connections).await?;
        if let Err(e) = store.migrate().await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        Ok(Self {
            store: Arc::new(store) as Arc<dyn KitchenStore>,
            config,
        })
    }

    pub fn from_parts(store: Arc<dyn KitchenStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// State over an empty in-memory store.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: "memory://".into(),
            max_connections: 1,
            dashboard: DashboardConfig::default(),
        });
        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
