//! Database migrations.

use crate::error::{FlotillaError, Result};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    // Create schema_version table if not exists
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    // Get current schema version
    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    // Edge stacks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS edge_stacks (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            edge_groups TEXT NOT NULL,
            deployment_type TEXT NOT NULL,
            entry_point TEXT NOT NULL DEFAULT '',
            manifest_path TEXT NOT NULL DEFAULT '',
            use_manifest_namespaces INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL,
            num_deployments INTEGER NOT NULL DEFAULT 0,
            project_path TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    // Environments table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS environments (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            environment_type TEXT NOT NULL,
            group_id TEXT NOT NULL,
            tag_ids TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_environments_group ON environments(group_id)")
        .execute(pool)
        .await
        .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    // Environment groups table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS environment_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            tag_ids TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    // Edge groups table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS edge_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            dynamic INTEGER NOT NULL DEFAULT 0,
            tag_ids TEXT NOT NULL,
            environment_ids TEXT NOT NULL,
            partial_match INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    // Relations table, one row per environment
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS relations (
            environment_id TEXT PRIMARY KEY,
            edge_stacks TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(1i64)
        .execute(pool)
        .await
        .map_err(|e| FlotillaError::MigrationFailed { reason: e.to_string() })?;

    Ok(())
}
