//! Environment-driven configuration for the sync service.

use anyhow::Context;

use regionsync_bus_kafka::BusConfig;
use regionsync_core::{Region, RegionPair};
use regionsync_storage_postgres::PgStoreConfig;

/// Default port for the read API.
const DEFAULT_HTTP_PORT: u16 = 4000;

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Everything the service needs to start, resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub regions: RegionPair,
    pub store: PgStoreConfig,
    pub bus: BusConfig,
    pub http_port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let local = Region::new(env_trimmed("REGION").context("REGION is required")?);
        let peer = match env_trimmed("PEER_REGION") {
            Some(tag) => Region::new(tag),
            None => RegionPair::conventional_peer(&local)
                .context("PEER_REGION is required when REGION is not india or china")?,
        };
        let regions = RegionPair::new(local.clone(), peer);

        let store = PgStoreConfig {
            host: env_trimmed("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: env_trimmed("DB_PORT")
                .map(|v| v.parse())
                .transpose()
                .context("DB_PORT must be a port number")?
                .unwrap_or(5432),
            database: env_trimmed("DB_NAME").context("DB_NAME is required")?,
            user: env_trimmed("DB_USER").context("DB_USER is required")?,
            password: env_trimmed("DB_PASSWORD").unwrap_or_default(),
            tls_required: env_trimmed("NODE_ENV").as_deref() == Some("production"),
        };

        let bus = BusConfig {
            broker: env_trimmed("KAFKA_BROKER").unwrap_or_else(|| "localhost:9092".to_string()),
            client_id: env_trimmed("CLIENT_ID")
                .unwrap_or_else(|| format!("regionsync-{local}")),
            group_id: env_trimmed("GROUP_ID")
                .unwrap_or_else(|| format!("regionsync-{local}-group")),
        };

        let http_port = env_trimmed("PORT")
            .map(|v| v.parse())
            .transpose()
            .context("PORT must be a port number")?
            .unwrap_or(DEFAULT_HTTP_PORT);

        Ok(Self {
            regions,
            store,
            bus,
            http_port,
        })
    }
}
