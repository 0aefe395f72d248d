use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors raised while setting up or probing the connection pool.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns construction of the shared Postgres pool. The pool itself handles
/// connection reuse and locking; nothing here is global.
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the pool and make sure at least one connection works.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let target = Self::redacted_url(&config.url)?;
        let pool = Self::options(config).connect(&config.url).await?;
        Self::health_check(&pool).await?;

        info!(
            "Created database pool for {} (max {} connections)",
            target, config.max_connections
        );
        Ok(pool)
    }

    /// Build the pool without opening a connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        Self::redacted_url(&config.url)?;
        Ok(Self::options(config).connect_lazy(&config.url)?)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    fn options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    /// Database URL with the password removed, for logs.
    pub fn redacted_url(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(None)
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
