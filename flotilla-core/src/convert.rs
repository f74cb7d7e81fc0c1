//! Compose to Kubernetes manifest conversion.
//!
//! Conversion is a black box behind the `ManifestConverter` trait so the
//! update sequence can be tested with a stub and real deployments can
//! plug in a richer converter. The built-in converter performs a minimal
//! deterministic translation: one Deployment document per compose
//! service.

use crate::error::{FlotillaError, Result};
use async_trait::async_trait;
use tracing::{info, instrument};

/// Converts a compose bundle into an orchestrator manifest for the given
/// target environments.
#[async_trait]
pub trait ManifestConverter: Send + Sync {
    /// Convert compose file content into Kubernetes manifest content.
    ///
    /// `target_environment_ids` identifies the orchestrator environments
    /// the manifest is generated for; converters may use it to tailor
    /// output per target.
    async fn convert(
        &self,
        compose_content: &str,
        target_environment_ids: &[String],
    ) -> Result<String>;
}

/// Built-in converter emitting one Deployment per compose service.
#[derive(Debug, Default)]
pub struct ComposeManifestConverter;

#[async_trait]
impl ManifestConverter for ComposeManifestConverter {
    #[instrument(skip(self, compose_content))]
    async fn convert(
        &self,
        compose_content: &str,
        target_environment_ids: &[String],
    ) -> Result<String> {
        info!(
            targets = target_environment_ids.len(),
            "Converting compose content to Kubernetes manifest"
        );

        let compose: serde_yaml::Value =
            serde_yaml::from_str(compose_content).map_err(|e| FlotillaError::ConversionFailed {
                reason: format!("invalid compose content: {}", e),
            })?;

        let services = compose
            .get("services")
            .and_then(|s| s.as_mapping())
            .ok_or_else(|| FlotillaError::ConversionFailed {
                reason: "compose content has no services".to_string(),
            })?;

        let mut documents = Vec::new();
        for (name, service) in services {
            let name = name.as_str().ok_or_else(|| FlotillaError::ConversionFailed {
                reason: "service name is not a string".to_string(),
            })?;

            let image = service
                .get("image")
                .and_then(|i| i.as_str())
                .ok_or_else(|| FlotillaError::ConversionFailed {
                    reason: format!("service '{}' has no image", name),
                })?;

            documents.push(deployment_document(name, image));
        }

        Ok(documents.join("---\n"))
    }
}

fn deployment_document(name: &str, image: &str) -> String {
    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  labels:
    app: {name}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: {name}
          image: {image}
"#
    )
}
