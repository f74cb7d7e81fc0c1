//! Edge stack update sequence.
//!
//! One request-scoped pass over a stack: validate the payload, resolve
//! old and new target sets, guard deployment-type compatibility,
//! reconcile relations, transition on-disk artifacts, invalidate
//! version-scoped status, then persist the stack record exactly once.
//!
//! Steps are ordered cheapest-to-validate first. Relation writes are the
//! single step not rolled back when a later step fails; the stack record
//! carrying the new group list is only persisted after everything else
//! succeeded. Concurrent updates to the same stack must be serialized by
//! the caller.

use crate::convert::ManifestConverter;
use crate::edge::membership::{related_environments, RelationSnapshot};
use crate::edge::reconcile::reconcile_relations;
use crate::error::{FlotillaError, Result};
use crate::files::FileStore;
use crate::state::StateManager;
use crate::types::{
    DeploymentType, EdgeStack, Environment, COMPOSE_FILE_DEFAULT_NAME, MANIFEST_FILE_DEFAULT_NAME,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// Caller-supplied update for an edge stack.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// New bundle content (compose file or manifest, per `deployment_type`)
    pub stack_file_content: String,

    /// New version; a change clears the per-environment status map
    pub version: Option<i64>,

    /// Edge groups the stack should target
    pub edge_groups: Vec<String>,

    /// Content format of the bundle
    pub deployment_type: DeploymentType,

    /// Honor namespaces declared in the manifest instead of the default one
    pub use_manifest_namespaces: bool,
}

impl UpdateRequest {
    /// Validate the payload before touching any state.
    pub fn validate(&self) -> Result<()> {
        if self.stack_file_content.is_empty() {
            return Err(FlotillaError::InvalidPayload {
                reason: "invalid stack file content".to_string(),
            });
        }

        if self.edge_groups.is_empty() {
            return Err(FlotillaError::InvalidPayload {
                reason: "edge groups are mandatory for an edge stack".to_string(),
            });
        }

        Ok(())
    }
}

/// Applies stack updates against the store, file store and converter.
pub struct StackUpdater {
    state: Arc<StateManager>,
    files: FileStore,
    converter: Arc<dyn ManifestConverter>,
}

impl StackUpdater {
    /// Create a new stack updater.
    pub fn new(
        state: Arc<StateManager>,
        files: FileStore,
        converter: Arc<dyn ManifestConverter>,
    ) -> Self {
        Self { state, files, converter }
    }

    /// Update an edge stack and return the persisted record.
    #[instrument(skip(self, request), fields(stack_id = %stack_id))]
    pub async fn update_stack(&self, stack_id: &str, request: UpdateRequest) -> Result<EdgeStack> {
        request.validate()?;

        let mut stack = self.state.get_edge_stack(stack_id).await?;
        let snapshot = RelationSnapshot::fetch(&self.state).await?;

        // The stored group list is authoritative data, not caller input;
        // a dangling reference there is an internal inconsistency.
        let old_set = related_environments(&stack.edge_groups, &snapshot).map_err(|e| match e {
            FlotillaError::EdgeGroupNotFound { group_id } => FlotillaError::Internal(format!(
                "stack {} references unknown edge group {}",
                stack.id, group_id
            )),
            other => other,
        })?;

        let new_set = related_environments(&request.edge_groups, &snapshot)?;

        if let Some(environment_id) =
            incompatible_environment(&new_set, &snapshot.environments, request.deployment_type)
        {
            return Err(FlotillaError::IncompatibleEnvironmentType { environment_id });
        }

        // First irrevocable step: relation records now reflect the new
        // target set. Everything after this must succeed before the
        // stack record is allowed to say so too.
        reconcile_relations(&self.state, &stack.id, &old_set, &new_set).await?;
        stack.edge_groups = request.edge_groups.clone();

        if stack.deployment_type != request.deployment_type {
            info!(
                from = stack.deployment_type.as_str(),
                to = request.deployment_type.as_str(),
                "Deployment type changed, discarding old artifacts"
            );
            self.files.remove_directory(&stack.project_path).await;
            stack.entry_point.clear();
            stack.manifest_path.clear();
            stack.deployment_type = request.deployment_type;
        }

        let stack_folder = stack.id.clone();
        match request.deployment_type {
            DeploymentType::Compose => {
                if stack.entry_point.is_empty() {
                    stack.entry_point = COMPOSE_FILE_DEFAULT_NAME.to_string();
                }

                let project_path = self
                    .files
                    .store_stack_file(
                        &stack_folder,
                        &stack.entry_point,
                        request.stack_file_content.as_bytes(),
                    )
                    .await?;
                stack.project_path = project_path.display().to_string();

                stack.manifest_path = self
                    .store_manifest_for_kubernetes_targets(
                        &stack_folder,
                        &request.stack_file_content,
                        &new_set,
                        &snapshot.environments,
                    )
                    .await?;
            }
            DeploymentType::Kubernetes => {
                if stack.manifest_path.is_empty() {
                    stack.manifest_path = MANIFEST_FILE_DEFAULT_NAME.to_string();
                }

                stack.use_manifest_namespaces = request.use_manifest_namespaces;

                let project_path = self
                    .files
                    .store_stack_file(
                        &stack_folder,
                        &stack.manifest_path,
                        request.stack_file_content.as_bytes(),
                    )
                    .await?;
                stack.project_path = project_path.display().to_string();
            }
        }

        // Version bump invalidates every per-environment status report.
        // Applied to the in-memory record so version and status land in
        // the same write below.
        if let Some(version) = request.version {
            if version != stack.version {
                info!(version, "Version changed, clearing deployment status");
                stack.version = version;
                stack.status.clear();
            }
        }

        stack.num_deployments = new_set.len();

        self.state.update_edge_stack(&stack).await?;

        Ok(stack)
    }

    /// Derive and store a Kubernetes manifest from compose content when
    /// the target set contains orchestrator environments. Returns the
    /// manifest file name, or empty when no such targets exist.
    async fn store_manifest_for_kubernetes_targets(
        &self,
        stack_folder: &str,
        compose_content: &str,
        new_set: &HashSet<String>,
        environments: &[Environment],
    ) -> Result<String> {
        let kubernetes_targets: Vec<String> = environments
            .iter()
            .filter(|e| new_set.contains(&e.id) && e.environment_type.is_kubernetes())
            .map(|e| e.id.clone())
            .collect();

        if kubernetes_targets.is_empty() {
            return Ok(String::new());
        }

        let manifest = self.converter.convert(compose_content, &kubernetes_targets).await?;
        self.files
            .store_stack_file(stack_folder, MANIFEST_FILE_DEFAULT_NAME, manifest.as_bytes())
            .await?;

        Ok(MANIFEST_FILE_DEFAULT_NAME.to_string())
    }
}

/// First environment in the target set whose runtime cannot deploy the
/// requested format, if any. Kubernetes stacks may only target
/// orchestrator environments; compose stacks only container runtimes.
/// Environments missing from the snapshot are ignored here; their
/// missing relation records surface later as internal errors.
pub fn incompatible_environment(
    target_set: &HashSet<String>,
    environments: &[Environment],
    deployment_type: DeploymentType,
) -> Option<String> {
    environments
        .iter()
        .filter(|e| target_set.contains(&e.id))
        .find(|e| match deployment_type {
            DeploymentType::Kubernetes => !e.environment_type.is_kubernetes(),
            DeploymentType::Compose => e.environment_type.is_kubernetes(),
        })
        .map(|e| e.id.clone())
}
