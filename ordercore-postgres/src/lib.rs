//! PostgreSQL adapter for the `OrderCore` store ports
//!
//! This crate implements the `ProductStore` and `OrderStore` traits over a
//! `sqlx` connection pool. Multi-row writes run inside a single database
//! transaction; order creation applies each line's stock decrement as a
//! conditional `UPDATE ... WHERE quantity >= n` and checks the affected-row
//! count, so two racing orders can never jointly drive stock negative.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use nutype::nutype;
use ordercore::errors::{StoreError, StoreResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::{query, Pool, Postgres};
use thiserror::Error;
use tracing::info;

mod store;

/// Error raised while constructing a [`PostgresStore`].
#[derive(Debug, Error)]
pub enum PostgresStoreError {
    /// The connection pool could not be created.
    #[error("failed to create postgres connection pool")]
    ConnectionFailed(#[source] sqlx::Error),
}

/// Maximum number of database connections in the pool.
///
/// `MaxConnections` must be at least 1, enforced by using `NonZeroU32` as
/// the underlying type.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(std::num::NonZeroU32);

/// Configuration for the [`PostgresStore`] connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30 seconds)
    pub acquire_timeout: Duration,
    /// Idle timeout for connections in the pool (default: 10 minutes)
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600), // 10 minutes
        }
    }
}

/// PostgreSQL-backed implementation of the `OrderCore` store ports.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new `PostgresStore` with default configuration.
    pub async fn new<S: Into<String>>(connection_string: S) -> Result<Self, PostgresStoreError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Create a new `PostgresStore` with custom configuration.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresStoreError> {
        let connection_string = connection_string.into();
        let max_connections: std::num::NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string)
            .await
            .map_err(PostgresStoreError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Create a `PostgresStore` from an existing connection pool.
    ///
    /// Use this when you need full control over pool configuration or want
    /// to share a pool across multiple components.
    pub const fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) const fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Verify the database connection is usable.
    pub async fn ping(&self) -> StoreResult<()> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("ping", error))?;
        Ok(())
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|error| StoreError::Configuration(format!("migration failed: {error}")))?;
        info!("[postgres.migrate] schema migrations applied");
        Ok(())
    }
}

/// Translate a low-level sqlx failure into the store error taxonomy,
/// prefixed with the operation that hit it.
fn map_sqlx_error(operation: &str, error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::ConnectionFailed(format!("{operation}: {error}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("{operation}: {error}"))
        }
        other => StoreError::Internal(format!("{operation}: {other}")),
    }
}
