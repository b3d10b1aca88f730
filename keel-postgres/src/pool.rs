//! Connection pool for PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::config::PgConfig;
use crate::connection::PgConnection;
use crate::error::{PgError, PgResult};
use crate::tls;

/// A connection pool for PostgreSQL.
#[derive(Clone)]
pub struct PgPool {
    inner: Pool,
    config: Arc<PgConfig>,
}

impl PgPool {
    /// Create a new connection pool with custom pool configuration.
    ///
    /// No connection is opened until the first [`get`](Self::get).
    pub fn with_pool_config(config: PgConfig, pool_config: PoolConfig) -> PgResult<Self> {
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pg_config = config.to_pg_config();
        let mgr = match tls::connector(config.ssl_mode)? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, NoTls, mgr_config),
        };

        let pool = Pool::builder(mgr)
            .runtime(Runtime::Tokio1)
            .max_size(pool_config.max_connections)
            .wait_timeout(pool_config.connection_timeout)
            .create_timeout(pool_config.connection_timeout)
            .recycle_timeout(pool_config.connection_timeout)
            .build()
            .map_err(|e| PgError::config(format!("failed to create pool: {}", e)))?;

        info!(
            host = %config.host,
            port = %config.port,
            database = %config.database,
            ssl_mode = ?config.ssl_mode,
            max_connections = %pool_config.max_connections,
            "PostgreSQL connection pool created"
        );

        Ok(Self {
            inner: pool,
            config: Arc::new(config),
        })
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> PgResult<PgConnection> {
        debug!("Acquiring connection from pool");
        let client = self.inner.get().await?;
        Ok(PgConnection::new(client))
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Create a builder for configuring the pool.
    pub fn builder() -> PgPoolBuilder {
        PgPoolBuilder::new()
    }
}

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: usize,
    /// Maximum time to wait for, create, or recycle a connection.
    pub connection_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // A migration run is sequential; one connection does the work.
        Self {
            max_connections: 2,
            connection_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Builder for creating a connection pool.
#[derive(Debug, Default)]
pub struct PgPoolBuilder {
    url: Option<String>,
    pool_config: PoolConfig,
}

impl PgPoolBuilder {
    /// Create a new pool builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Build the connection pool.
    pub fn build(self) -> PgResult<PgPool> {
        let url = self
            .url
            .ok_or_else(|| PgError::config("no database URL provided"))?;
        let config = PgConfig::from_url(url)?;

        PgPool::with_pool_config(config, self.pool_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.connection_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_pool_builder() {
        let builder = PgPoolBuilder::new().url("postgresql://localhost/test");
        assert!(builder.url.is_some());
        assert_eq!(builder.pool_config.max_connections, 2);
    }

    #[test]
    fn test_pool_builder_requires_url() {
        assert!(matches!(
            PgPoolBuilder::new().build(),
            Err(PgError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_pool_is_lazy() {
        let pool = PgPool::builder()
            .url("postgres://127.0.0.1:1/keel")
            .build()
            .unwrap();
        assert_eq!(pool.config().port, 1);
    }

    #[tokio::test]
    async fn test_pool_with_tls() {
        let pool = PgPool::builder()
            .url("postgres://127.0.0.1:1/keel?sslmode=verify-full")
            .build()
            .unwrap();
        assert_eq!(pool.config().ssl_mode, crate::config::SslMode::VerifyFull);
    }
}
