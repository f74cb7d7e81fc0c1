//! Environment domain types.

use serde::{Deserialize, Serialize};

/// Runtime flavor of a remote environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    /// Local Docker socket.
    Docker,
    /// Docker reached through a standalone agent.
    DockerAgent,
    /// Docker reached through a polling edge agent.
    EdgeAgentOnDocker,
    /// Local Kubernetes control plane.
    KubernetesLocal,
    /// Kubernetes reached through a standalone agent.
    KubernetesAgent,
    /// Kubernetes reached through a polling edge agent.
    EdgeAgentOnKubernetes,
}

impl EnvironmentType {
    /// Parse an environment type from its stored string form.
    pub fn parse(s: &str) -> Self {
        match s {
            "docker_agent" => EnvironmentType::DockerAgent,
            "edge_agent_on_docker" => EnvironmentType::EdgeAgentOnDocker,
            "kubernetes_local" => EnvironmentType::KubernetesLocal,
            "kubernetes_agent" => EnvironmentType::KubernetesAgent,
            "edge_agent_on_kubernetes" => EnvironmentType::EdgeAgentOnKubernetes,
            _ => EnvironmentType::Docker,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::Docker => "docker",
            EnvironmentType::DockerAgent => "docker_agent",
            EnvironmentType::EdgeAgentOnDocker => "edge_agent_on_docker",
            EnvironmentType::KubernetesLocal => "kubernetes_local",
            EnvironmentType::KubernetesAgent => "kubernetes_agent",
            EnvironmentType::EdgeAgentOnKubernetes => "edge_agent_on_kubernetes",
        }
    }

    /// Whether this environment runs an orchestrator and accepts manifest bundles.
    pub fn is_kubernetes(&self) -> bool {
        matches!(
            self,
            EnvironmentType::KubernetesLocal
                | EnvironmentType::KubernetesAgent
                | EnvironmentType::EdgeAgentOnKubernetes
        )
    }
}

/// A remote environment an agent reports from. Read-only to the
/// reconciliation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Unique environment identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Runtime flavor
    pub environment_type: EnvironmentType,

    /// Environment group this environment belongs to
    pub group_id: String,

    /// Tags attached directly to the environment
    pub tag_ids: Vec<String>,
}
