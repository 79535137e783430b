use anyhow::{Context, Result};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;

/// Store handle shared by the lifecycle engine and its callers
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the configured database, creating it and running migrations as needed
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(&config.url).await? {
            info!("Creating database at {}", config.url);
            Sqlite::create_database(&config.url)
                .await
                .with_context(|| format!("Failed to create database at {}", config.url))?;
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("Invalid database url {}", config.url))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {}", config.url))?;

        let database = Self { pool };
        if config.auto_migrate {
            database.migrate().await?;
        }

        Ok(database)
    }

    /// Private in-memory database with the schema applied
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Every connection to `:memory:` is a separate database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get database pool for queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}
