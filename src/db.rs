//! Database pool setup, migrations, and connection health.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Alias so callers depend on the pool concept, not the sea-orm type
pub type DbPool = DatabaseConnection;

/// Pool tuning knobs, normally derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Open a connection pool with explicit tuning.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(?config, "Opening database pool");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    gauge!(
        "wholesaler_db.max_connections",
        config.max_connections as f64
    );

    let pool = Database::connect(options)
        .await
        .map_err(ServiceError::DatabaseError)?;

    info!(
        max_connections = config.max_connections,
        "Database pool ready"
    );
    Ok(pool)
}

/// Open a connection pool tuned from the application configuration.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Bring the schema up to date.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let started = Instant::now();

    match crate::migrator::Migrator::up(pool, None).await {
        Ok(()) => {
            info!("Migrations completed in {:?}", started.elapsed());
            Ok(())
        }
        Err(e) => {
            error!("Migrations failed after {:?}: {}", started.elapsed(), e);
            Err(ServiceError::DatabaseError(e))
        }
    }
}

/// Ping the database, recording latency and failures.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();

    match pool.ping().await {
        Ok(()) => {
            let elapsed = started.elapsed();
            debug!("Database ping ok in {:?}", elapsed);
            gauge!(
                "wholesaler_db.connection_latency",
                elapsed.as_millis() as f64
            );
            Ok(())
        }
        Err(e) => {
            error!("Database ping failed after {:?}: {}", started.elapsed(), e);
            counter!("wholesaler_db.connection_failures", 1);
            Err(ServiceError::DatabaseError(e))
        }
    }
}

/// Close the pool, waiting for connections to drain.
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database pool");
    pool.close().await.map_err(ServiceError::DatabaseError)
}
