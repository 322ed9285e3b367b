//! Schema migrations for the relational note store.
//!
//! Migrations are applied in strictly increasing `version` order inside one
//! transaction; the applied version is mirrored to `PRAGMA user_version`.

use super::storage_error;
use application::ApplicationError;
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_notes.sql"),
}];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations. A database written by a newer binary is rejected.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<(), ApplicationError> {
    let current = current_version(pool).await?;
    let latest = latest_version();

    if current > latest {
        return Err(storage_error(
            "unsupported database schema",
            format!("version {} is newer than supported {}", current, latest),
        ));
    }
    if current == latest {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| storage_error("failed to start migration", e))?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("migration failed", e))?;
        sqlx::raw_sql(&format!("PRAGMA user_version = {};", migration.version))
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("migration failed", e))?;
        info!(version = migration.version, "Applied database migration");
    }
    tx.commit()
        .await
        .map_err(|e| storage_error("failed to commit migration", e))?;

    Ok(())
}

/// Reads the schema version recorded in `PRAGMA user_version`.
pub async fn current_version(pool: &SqlitePool) -> Result<u32, ApplicationError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version;")
        .fetch_one(pool)
        .await
        .map_err(|e| storage_error("failed to read schema version", e))?;
    Ok(u32::try_from(version).unwrap_or(0))
}
