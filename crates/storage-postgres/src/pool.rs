//! Connection pool setup for the local store.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;

use crate::error::Result;

/// Pool bounds shared by the consumer and the read API.
pub const POOL_MAX_CONNECTIONS: u32 = 20;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Sink connection settings.
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Managed-Postgres convention: TLS required, certificate not verified.
    pub tls_required: bool,
}

/// Open the pool, establishing one connection up front so an unreachable
/// sink surfaces at startup.
pub async fn connect(config: &PgStoreConfig) -> Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .ssl_mode(if config.tls_required {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        });

    let pool = PgPoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .idle_timeout(POOL_IDLE_TIMEOUT)
        .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;
    Ok(pool)
}
