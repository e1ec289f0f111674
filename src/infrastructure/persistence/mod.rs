use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions},
    AnyPool, ConnectOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::log::LevelFilter;

mod tickets;
mod users;
mod workspaces;

pub struct Database {
    pub(crate) pool: AnyPool,
}

impl Database {
    /// Opens the pool. `timeout` bounds both pool acquisition and SQLite's busy wait, so a
    /// stalled store surfaces as a transient error instead of blocking callers.
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, sqlx::Error> {
        // Ensure drivers are installed for AnyPool
        sqlx::any::install_default_drivers();

        let mut connect_options = AnyConnectOptions::from_str(database_url)?;

        connect_options = connect_options
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_secs(1));

        let is_sqlite = database_url.starts_with("sqlite");
        let busy_timeout_ms = timeout.as_millis();

        let pool = AnyPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .acquire_timeout(timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    // Per-connection settings; foreign keys drive the cascades.
                    if is_sqlite {
                        let busy = format!("PRAGMA busy_timeout = {}", busy_timeout_ms);
                        sqlx::query(&busy).execute(&mut *conn).await?;
                        sqlx::query("PRAGMA synchronous = NORMAL")
                            .execute(&mut *conn)
                            .await?;
                        sqlx::query("PRAGMA foreign_keys = ON")
                            .execute(&mut *conn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await?;

        if is_sqlite {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await?;
        }

        tracing::info!("Database pool ready (acquire timeout {:?})", timeout);

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// SQLite stores booleans as integers; the Any driver decodes them as `i64`.
pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
