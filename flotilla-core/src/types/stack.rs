//! Edge stack domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Default compose entry point file name.
pub const COMPOSE_FILE_DEFAULT_NAME: &str = "docker-compose.yml";

/// Default Kubernetes manifest file name.
pub const MANIFEST_FILE_DEFAULT_NAME: &str = "manifest.yml";

/// Content format a stack is deployed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    /// docker-compose style bundle, deployed to container runtimes.
    Compose,
    /// Kubernetes manifest bundle, deployed to orchestrator environments.
    Kubernetes,
}

impl DeploymentType {
    /// Parse a deployment type from its stored string form.
    pub fn parse(s: &str) -> Self {
        match s {
            "kubernetes" => DeploymentType::Kubernetes,
            _ => DeploymentType::Compose,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Compose => "compose",
            DeploymentType::Kubernetes => "kubernetes",
        }
    }
}

/// Last reported deployment outcome for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Not yet picked up by the agent.
    #[default]
    Pending,
    /// Agent has seen the stack version but not finished deploying.
    Acknowledged,
    /// Deployed successfully.
    Ok,
    /// Deployment failed.
    Error,
}

/// Per-environment deployment status for a stack version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeploymentStatus {
    /// Outcome kind.
    pub kind: StatusKind,

    /// Error detail when `kind` is `Error`.
    pub error: String,

    /// Unix timestamp of the report.
    pub time: i64,
}

/// Versioned deployment bundle targeting a set of edge groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStack {
    /// Unique stack identifier (UUID v4)
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Edge groups this stack targets, in payload order
    pub edge_groups: Vec<String>,

    /// Content format of the bundle
    pub deployment_type: DeploymentType,

    /// Compose entry point file name (compose stacks only)
    pub entry_point: String,

    /// Kubernetes manifest file name (kubernetes stacks only)
    pub manifest_path: String,

    /// Honor namespaces declared in the manifest instead of the default one
    pub use_manifest_namespaces: bool,

    /// Version counter; agents redeploy when it changes
    pub version: i64,

    /// Last known deployment status per environment id
    pub status: HashMap<String, DeploymentStatus>,

    /// Number of environments currently targeted
    pub num_deployments: usize,

    /// On-disk project folder holding the stack files
    pub project_path: String,

    /// Creation timestamp
    pub created_at: SystemTime,
}

impl EdgeStack {
    /// Create a new stack with a fresh id, at version 1, with no
    /// deployments yet.
    pub fn new(
        name: impl Into<String>,
        edge_groups: Vec<String>,
        deployment_type: DeploymentType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            edge_groups,
            deployment_type,
            entry_point: String::new(),
            manifest_path: String::new(),
            use_manifest_namespaces: false,
            version: 1,
            status: HashMap::new(),
            num_deployments: 0,
            project_path: String::new(),
            created_at: SystemTime::now(),
        }
    }
}
