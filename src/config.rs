use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub expiring_within_days: i64,
    pub low_stock_threshold: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            expiring_within_days: 3,
            low_stock_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let defaults = DashboardConfig::default();
        let dashboard = DashboardConfig {
            expiring_within_days: std::env::var("EXPIRING_WITHIN_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(defaults.expiring_within_days),
            low_stock_threshold: std::env::var("LOW_STOCK_THRESHOLD")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(defaults.low_stock_threshold),
        };
        Ok(Self {
            database_url,
            max_connections,
            dashboard,
        })
    }
}
