//! State management with SQLite persistence.
//!
//! The StateManager handles all persistent state for flotilla:
//! - Edge stacks and their per-environment status maps
//! - Environments and environment groups
//! - Edge groups (static and dynamic)
//! - Relations (per-environment stack membership, polled by agents)
//!
//! The store guarantees single-row atomicity only. Updates to the same
//! stack must be serialized by the caller; the reconciliation core reads
//! then writes without an optimistic version check.

use crate::error::{FlotillaError, Result};
use crate::types::{
    DeploymentStatus, DeploymentType, EdgeGroup, EdgeStack, Environment, EnvironmentGroup,
    EnvironmentType, Relation,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Row};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{info, instrument};

pub mod migrations;


/// State manager for persistent storage.
#[derive(Clone)]
pub struct StateManager {
    pool: SqlitePool,
}

impl StateManager {
    /// Create a new StateManager with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    /// Get a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a new StateManager with a database at the specified path.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing state manager at {:?}", db_path);

        // Create parent directory if it doesn't exist (but not for :memory:)
        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    FlotillaError::InvalidConfig {
                        reason: format!("Failed to create directory {}: {}", parent.display(), e),
                    }
                })?;
            }
        }

        // Configure SQLite connection
        let mut options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            FlotillaError::InvalidConfig { reason: "Invalid database path".to_string() }
        })?)
        .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        options = options.create_if_missing(true).log_statements(tracing::log::LevelFilter::Debug);

        // Create connection pool
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        let manager = Self { pool };

        // Run migrations
        manager.run_migrations().await?;

        info!("State manager initialized successfully");
        Ok(manager)
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    // ========================
    // Edge Stack Operations
    // ========================

    /// Insert a new edge stack.
    #[instrument(skip(self), fields(stack_id = %stack.id))]
    pub async fn insert_edge_stack(&self, stack: &EdgeStack) -> Result<()> {
        let groups_json = serde_json::to_string(&stack.edge_groups).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize edge groups: {}", e))
        })?;

        let status_json = serde_json::to_string(&stack.status).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize status: {}", e))
        })?;

        let created_at =
            stack.created_at.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs()
                as i64;

        sqlx::query(
            r#"
            INSERT INTO edge_stacks (id, name, edge_groups, deployment_type, entry_point, manifest_path, use_manifest_namespaces, version, status, num_deployments, project_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stack.id)
        .bind(&stack.name)
        .bind(groups_json)
        .bind(stack.deployment_type.as_str())
        .bind(&stack.entry_point)
        .bind(&stack.manifest_path)
        .bind(stack.use_manifest_namespaces)
        .bind(stack.version)
        .bind(status_json)
        .bind(stack.num_deployments as i64)
        .bind(&stack.project_path)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("flotilla_db_errors_total", "operation" => "insert_edge_stack")
                .increment(1);
            FlotillaError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    /// Get an edge stack by ID.
    #[instrument(skip(self), fields(stack_id = %id))]
    pub async fn get_edge_stack(&self, id: &str) -> Result<EdgeStack> {
        let row = sqlx::query("SELECT * FROM edge_stacks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                metrics::counter!("flotilla_db_errors_total", "operation" => "get_edge_stack")
                    .increment(1);
                FlotillaError::DatabaseError(e.to_string())
            })?
            .ok_or_else(|| FlotillaError::StackNotFound { stack_id: id.to_string() })?;

        self.row_to_edge_stack(row)
    }

    /// List all edge stacks.
    #[instrument(skip(self))]
    pub async fn list_edge_stacks(&self) -> Result<Vec<EdgeStack>> {
        let rows = sqlx::query("SELECT * FROM edge_stacks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(|row| self.row_to_edge_stack(row)).collect()
    }

    /// Update an edge stack. Covers the group list, deployment type and
    /// content fields, version, status map and target count in one write.
    #[instrument(skip(self, stack), fields(stack_id = %stack.id))]
    pub async fn update_edge_stack(&self, stack: &EdgeStack) -> Result<()> {
        let groups_json = serde_json::to_string(&stack.edge_groups).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize edge groups: {}", e))
        })?;

        let status_json = serde_json::to_string(&stack.status).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize status: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE edge_stacks SET
                name = ?, edge_groups = ?, deployment_type = ?, entry_point = ?,
                manifest_path = ?, use_manifest_namespaces = ?, version = ?,
                status = ?, num_deployments = ?, project_path = ?
            WHERE id = ?
            "#,
        )
        .bind(&stack.name)
        .bind(groups_json)
        .bind(stack.deployment_type.as_str())
        .bind(&stack.entry_point)
        .bind(&stack.manifest_path)
        .bind(stack.use_manifest_namespaces)
        .bind(stack.version)
        .bind(status_json)
        .bind(stack.num_deployments as i64)
        .bind(&stack.project_path)
        .bind(&stack.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("flotilla_db_errors_total", "operation" => "update_edge_stack")
                .increment(1);
            FlotillaError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    /// Delete an edge stack.
    #[instrument(skip(self), fields(stack_id = %id))]
    pub async fn delete_edge_stack(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM edge_stacks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    fn row_to_edge_stack(&self, row: sqlx::sqlite::SqliteRow) -> Result<EdgeStack> {
        let groups_json: String = row.get("edge_groups");
        let edge_groups: Vec<String> = serde_json::from_str(&groups_json).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to deserialize edge groups: {}", e))
        })?;

        let status_json: String = row.get("status");
        let status: HashMap<String, DeploymentStatus> =
            serde_json::from_str(&status_json).map_err(|e| {
                FlotillaError::DatabaseError(format!("Failed to deserialize status: {}", e))
            })?;

        let type_str: String = row.get("deployment_type");
        let deployment_type = DeploymentType::parse(&type_str);

        let created_at_secs: i64 = row.get("created_at");
        let created_at =
            SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(created_at_secs as u64);

        let num_deployments: i64 = row.get("num_deployments");

        Ok(EdgeStack {
            id: row.get("id"),
            name: row.get("name"),
            edge_groups,
            deployment_type,
            entry_point: row.get("entry_point"),
            manifest_path: row.get("manifest_path"),
            use_manifest_namespaces: row.get("use_manifest_namespaces"),
            version: row.get("version"),
            status,
            num_deployments: num_deployments as usize,
            project_path: row.get("project_path"),
            created_at,
        })
    }

    // ========================
    // Environment Operations
    // ========================

    /// Insert a new environment.
    #[instrument(skip(self), fields(environment_id = %environment.id))]
    pub async fn insert_environment(&self, environment: &Environment) -> Result<()> {
        let tags_json = serde_json::to_string(&environment.tag_ids).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize tags: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO environments (id, name, environment_type, group_id, tag_ids)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&environment.id)
        .bind(&environment.name)
        .bind(environment.environment_type.as_str())
        .bind(&environment.group_id)
        .bind(tags_json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("flotilla_db_errors_total", "operation" => "insert_environment")
                .increment(1);
            FlotillaError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    /// Register an environment: insert it together with its empty relation
    /// record. Relations must exist before any stack can target the
    /// environment.
    #[instrument(skip(self), fields(environment_id = %environment.id))]
    pub async fn register_environment(&self, environment: &Environment) -> Result<()> {
        self.insert_environment(environment).await?;
        self.insert_relation(&Relation::new(&environment.id)).await
    }

    /// Get an environment by ID.
    #[instrument(skip(self), fields(environment_id = %id))]
    pub async fn get_environment(&self, id: &str) -> Result<Environment> {
        let row = sqlx::query("SELECT * FROM environments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?
            .ok_or_else(|| FlotillaError::EnvironmentNotFound { environment_id: id.to_string() })?;

        self.row_to_environment(row)
    }

    /// List all environments.
    #[instrument(skip(self))]
    pub async fn list_environments(&self) -> Result<Vec<Environment>> {
        let rows = sqlx::query("SELECT * FROM environments ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(|row| self.row_to_environment(row)).collect()
    }

    /// Delete an environment.
    #[instrument(skip(self), fields(environment_id = %id))]
    pub async fn delete_environment(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM environments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    fn row_to_environment(&self, row: sqlx::sqlite::SqliteRow) -> Result<Environment> {
        let tags_json: String = row.get("tag_ids");
        let tag_ids: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

        let type_str: String = row.get("environment_type");

        Ok(Environment {
            id: row.get("id"),
            name: row.get("name"),
            environment_type: EnvironmentType::parse(&type_str),
            group_id: row.get("group_id"),
            tag_ids,
        })
    }

    // ========================
    // Environment Group Operations
    // ========================

    /// Insert a new environment group.
    #[instrument(skip(self), fields(group_id = %group.id))]
    pub async fn insert_environment_group(&self, group: &EnvironmentGroup) -> Result<()> {
        let tags_json = serde_json::to_string(&group.tag_ids).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize tags: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO environment_groups (id, name, tag_ids)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(tags_json)
        .execute(&self.pool)
        .await
        .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Get an environment group by ID.
    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn get_environment_group(&self, id: &str) -> Result<EnvironmentGroup> {
        let row = sqlx::query("SELECT * FROM environment_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?
            .ok_or_else(|| FlotillaError::EnvironmentGroupNotFound { group_id: id.to_string() })?;

        self.row_to_environment_group(row)
    }

    /// List all environment groups.
    #[instrument(skip(self))]
    pub async fn list_environment_groups(&self) -> Result<Vec<EnvironmentGroup>> {
        let rows = sqlx::query("SELECT * FROM environment_groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(|row| self.row_to_environment_group(row)).collect()
    }

    fn row_to_environment_group(&self, row: sqlx::sqlite::SqliteRow) -> Result<EnvironmentGroup> {
        let tags_json: String = row.get("tag_ids");
        let tag_ids: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

        Ok(EnvironmentGroup { id: row.get("id"), name: row.get("name"), tag_ids })
    }

    // ========================
    // Edge Group Operations
    // ========================

    /// Insert a new edge group.
    #[instrument(skip(self), fields(group_id = %group.id))]
    pub async fn insert_edge_group(&self, group: &EdgeGroup) -> Result<()> {
        let tags_json = serde_json::to_string(&group.tag_ids).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize tags: {}", e))
        })?;

        let environments_json = serde_json::to_string(&group.environment_ids).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize environments: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO edge_groups (id, name, dynamic, tag_ids, environment_ids, partial_match)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(group.dynamic)
        .bind(tags_json)
        .bind(environments_json)
        .bind(group.partial_match)
        .execute(&self.pool)
        .await
        .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Get an edge group by ID.
    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn get_edge_group(&self, id: &str) -> Result<EdgeGroup> {
        let row = sqlx::query("SELECT * FROM edge_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?
            .ok_or_else(|| FlotillaError::EdgeGroupNotFound { group_id: id.to_string() })?;

        self.row_to_edge_group(row)
    }

    /// List all edge groups.
    #[instrument(skip(self))]
    pub async fn list_edge_groups(&self) -> Result<Vec<EdgeGroup>> {
        let rows = sqlx::query("SELECT * FROM edge_groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(|row| self.row_to_edge_group(row)).collect()
    }

    /// Delete an edge group.
    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn delete_edge_group(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM edge_groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    fn row_to_edge_group(&self, row: sqlx::sqlite::SqliteRow) -> Result<EdgeGroup> {
        let tags_json: String = row.get("tag_ids");
        let tag_ids: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

        let environments_json: String = row.get("environment_ids");
        let environment_ids: Vec<String> =
            serde_json::from_str(&environments_json).unwrap_or_default();

        Ok(EdgeGroup {
            id: row.get("id"),
            name: row.get("name"),
            dynamic: row.get("dynamic"),
            tag_ids,
            environment_ids,
            partial_match: row.get("partial_match"),
        })
    }

    // ========================
    // Relation Operations
    // ========================

    /// Insert a new relation record.
    #[instrument(skip(self), fields(environment_id = %relation.environment_id))]
    pub async fn insert_relation(&self, relation: &Relation) -> Result<()> {
        let stacks_json = serde_json::to_string(&relation.edge_stacks).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize edge stacks: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO relations (environment_id, edge_stacks)
            VALUES (?, ?)
            "#,
        )
        .bind(&relation.environment_id)
        .bind(stacks_json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("flotilla_db_errors_total", "operation" => "insert_relation")
                .increment(1);
            FlotillaError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    /// Get the relation record for an environment.
    #[instrument(skip(self), fields(environment_id = %environment_id))]
    pub async fn get_relation(&self, environment_id: &str) -> Result<Relation> {
        let row = sqlx::query("SELECT * FROM relations WHERE environment_id = ?")
            .bind(environment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FlotillaError::DatabaseError(e.to_string()))?
            .ok_or_else(|| FlotillaError::RelationNotFound {
                environment_id: environment_id.to_string(),
            })?;

        self.row_to_relation(row)
    }

    /// Update the relation record for an environment.
    #[instrument(skip(self, relation), fields(environment_id = %relation.environment_id))]
    pub async fn update_relation(&self, relation: &Relation) -> Result<()> {
        let stacks_json = serde_json::to_string(&relation.edge_stacks).map_err(|e| {
            FlotillaError::DatabaseError(format!("Failed to serialize edge stacks: {}", e))
        })?;

        sqlx::query("UPDATE relations SET edge_stacks = ? WHERE environment_id = ?")
            .bind(stacks_json)
            .bind(&relation.environment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                metrics::counter!("flotilla_db_errors_total", "operation" => "update_relation")
                    .increment(1);
                FlotillaError::DatabaseError(e.to_string())
            })?;

        Ok(())
    }

    fn row_to_relation(&self, row: sqlx::sqlite::SqliteRow) -> Result<Relation> {
        let stacks_json: String = row.get("edge_stacks");
        let edge_stacks: HashMap<String, bool> =
            serde_json::from_str(&stacks_json).map_err(|e| {
                FlotillaError::DatabaseError(format!("Failed to deserialize edge stacks: {}", e))
            })?;

        Ok(Relation { environment_id: row.get("environment_id"), edge_stacks })
    }
}
