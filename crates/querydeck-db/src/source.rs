//! A single named SQL data source and its connection pool.
//!
//! Pools are created lazily from a [`DataSourceConfig`]: no connection is
//! opened until the first query (or [`SqlDataSource::ping`]) needs one.
//! Queries run as plain text with no parameters, exactly as written in the
//! query definition, and are streamed row by row into a [`ResultSet`].

use std::time::Duration;

use futures::TryStreamExt;
use querydeck_core::config::{DataSourceConfig, DatabaseSettings, DbKind};
use querydeck_types::ResultSet;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{MySqlPool, PgPool};

use crate::decode;
use crate::error::DbError;

/// Idle connection timeout for every pool.
const IDLE_TIMEOUT_SECS: u64 = 300;

/// Driver-specific pool behind a data source.
#[derive(Debug, Clone)]
pub enum SqlPool {
    /// `PostgreSQL` pool.
    Postgres(PgPool),
    /// `MySQL` pool.
    MySql(MySqlPool),
}

/// A named, pooled connection to one database.
#[derive(Debug, Clone)]
pub struct SqlDataSource {
    name: String,
    pool: SqlPool,
}

impl SqlDataSource {
    /// Build a lazily connecting pool for `config`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Definition`] for an unsupported driver and
    /// [`DbError::Config`] for a malformed connection URL.
    pub fn connect_lazy(
        config: &DataSourceConfig,
        settings: &DatabaseSettings,
    ) -> Result<Self, DbError> {
        let acquire_timeout = Duration::from_secs(settings.connect_timeout_secs);
        let idle_timeout = Duration::from_secs(IDLE_TIMEOUT_SECS);

        let pool = match config.kind()? {
            DbKind::Postgres => SqlPool::Postgres(
                PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect_lazy_with(pg_options(config)?),
            ),
            DbKind::MySql => SqlPool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect_lazy_with(mysql_options(config)?),
            ),
        };

        Ok(Self {
            name: config.name.clone(),
            pool,
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(name: impl Into<String>, pool: SqlPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    /// The data source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &SqlPool {
        &self.pool
    }

    /// Run `SELECT 1` to confirm the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sql`] if no connection can be opened.
    pub async fn ping(&self) -> Result<(), DbError> {
        match &self.pool {
            SqlPool::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            SqlPool::MySql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Execute `query` and collect every row.
    ///
    /// Column names come from the first row; an empty result has none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sql`] if the query fails or the row stream breaks
    /// part way through.
    pub async fn fetch_all(&self, query: &str) -> Result<ResultSet, DbError> {
        let mut result = ResultSet::default();
        match &self.pool {
            SqlPool::Postgres(pool) => {
                let mut rows = sqlx::query(query).fetch(pool);
                while let Some(row) = rows.try_next().await? {
                    if result.columns.is_empty() {
                        result.columns = decode::column_names(&row);
                    }
                    result.rows.push(decode::pg_row(&row));
                }
            }
            SqlPool::MySql(pool) => {
                let mut rows = sqlx::query(query).fetch(pool);
                while let Some(row) = rows.try_next().await? {
                    if result.columns.is_empty() {
                        result.columns = decode::column_names(&row);
                    }
                    result.rows.push(decode::mysql_row(&row));
                }
            }
        }
        Ok(result)
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        match &self.pool {
            SqlPool::Postgres(pool) => pool.close().await,
            SqlPool::MySql(pool) => pool.close().await,
        }
    }
}

/// Build `PostgreSQL` connect options from a definition.
///
/// # Errors
///
/// Returns [`DbError::Config`] if `url` is set but malformed.
pub fn pg_options(config: &DataSourceConfig) -> Result<PgConnectOptions, DbError> {
    if let Some(url) = &config.url {
        return url
            .parse()
            .map_err(|e| DbError::Config(format!("data source `{}`: {e}", config.name)));
    }

    let mut options = PgConnectOptions::new()
        .username(&config.username)
        .password(&config.password)
        .database(&config.db_name);
    if !config.host.is_empty() {
        options = options.host(&config.host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    Ok(options)
}

/// Build `MySQL` connect options from a definition.
///
/// # Errors
///
/// Returns [`DbError::Config`] if `url` is set but malformed.
pub fn mysql_options(config: &DataSourceConfig) -> Result<MySqlConnectOptions, DbError> {
    if let Some(url) = &config.url {
        return url
            .parse()
            .map_err(|e| DbError::Config(format!("data source `{}`: {e}", config.name)));
    }

    let mut options = MySqlConnectOptions::new()
        .username(&config.username)
        .password(&config.password)
        .database(&config.db_name);
    if !config.host.is_empty() {
        options = options.host(&config.host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    Ok(options)
}
