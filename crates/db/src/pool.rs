//! Connection pool and schema migrations for the execution store.

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

pub type DbPool = PgPool;

/// Schema migrations, embedded from the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// How long a query waits for a free connection before failing.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            url: url.into(),
            max_connections: max_connections.max(1),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Open the pool. Fails fast when the store is unreachable.
pub async fn connect(settings: &PoolSettings) -> Result<DbPool, DbError> {
    info!(
        max_connections = settings.max_connections,
        "connecting to the execution store"
    );
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(&settings.url)
        .await
        .map_err(DbError::Connect)
}

/// Apply every pending migration. Returns the number of migrations the
/// schema is built from.
pub async fn migrate(pool: &DbPool) -> Result<usize, DbError> {
    MIGRATOR.run(pool).await?;
    let count = MIGRATOR.iter().count();
    info!(migrations = count, "execution store schema is up to date");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_keep_at_least_one_connection() {
        let settings = PoolSettings::new("postgres://localhost/rusty_flow", 0);
        assert_eq!(settings.max_connections, 1);
        assert_eq!(settings.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
    }

    #[test]
    fn schema_migrations_are_embedded() {
        let descriptions: Vec<_> = MIGRATOR.iter().map(|m| m.description.to_string()).collect();
        assert!(descriptions.iter().any(|d| d == "init"), "{descriptions:?}");
    }
}
