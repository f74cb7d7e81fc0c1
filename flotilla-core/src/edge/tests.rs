#[cfg(test)]
mod tests {
    use crate::convert::ComposeManifestConverter;
    use crate::edge::{StackUpdater, UpdateRequest};
    use crate::error::FlotillaError;
    use crate::files::FileStore;
    use crate::state::StateManager;
    use crate::types::{
        DeploymentStatus, DeploymentType, EdgeGroup, EdgeStack, Environment, EnvironmentType,
        StatusKind,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn harness() -> (Arc<StateManager>, StackUpdater, TempDir) {
        let state = Arc::new(StateManager::new_in_memory().await.unwrap());
        let dir = TempDir::new().unwrap();
        let updater = StackUpdater::new(
            state.clone(),
            FileStore::with_base_dir(dir.path()),
            Arc::new(ComposeManifestConverter),
        );
        (state, updater, dir)
    }

    async fn register_environment(state: &StateManager, id: &str, kind: EnvironmentType) {
        let environment = Environment {
            id: id.to_string(),
            name: id.to_string(),
            environment_type: kind,
            group_id: "default".to_string(),
            tag_ids: vec![],
        };
        state.register_environment(&environment).await.unwrap();
    }

    async fn insert_static_group(state: &StateManager, id: &str, members: &[&str]) {
        let group = EdgeGroup {
            id: id.to_string(),
            name: id.to_string(),
            dynamic: false,
            tag_ids: vec![],
            environment_ids: members.iter().map(|m| m.to_string()).collect(),
            partial_match: false,
        };
        state.insert_edge_group(&group).await.unwrap();
    }

    /// Insert a compose stack targeting the given groups, with relation
    /// entries already in place for `targets`.
    async fn insert_stack(state: &StateManager, groups: &[&str], targets: &[&str]) -> EdgeStack {
        let mut stack = EdgeStack::new(
            "test-stack",
            groups.iter().map(|g| g.to_string()).collect(),
            DeploymentType::Compose,
        );
        stack.entry_point = "docker-compose.yml".to_string();
        stack.num_deployments = targets.len();
        state.insert_edge_stack(&stack).await.unwrap();

        for target in targets {
            let mut relation = state.get_relation(target).await.unwrap();
            relation.edge_stacks.insert(stack.id.clone(), true);
            state.update_relation(&relation).await.unwrap();
        }

        stack
    }

    fn compose_request(groups: &[&str], version: Option<i64>) -> UpdateRequest {
        UpdateRequest {
            stack_file_content: "services:\n  web:\n    image: nginx:1.27\n".to_string(),
            version,
            edge_groups: groups.iter().map(|g| g.to_string()).collect(),
            deployment_type: DeploymentType::Compose,
            use_manifest_namespaces: false,
        }
    }

    #[tokio::test]
    async fn adding_a_group_extends_the_target_set() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        register_environment(&state, "e2", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        insert_static_group(&state, "g2", &["e2"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        let updated =
            updater.update_stack(&stack.id, compose_request(&["g1", "g2"], Some(1))).await.unwrap();

        assert_eq!(updated.num_deployments, 2);
        assert_eq!(updated.edge_groups, vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(updated.version, 1);

        // e1 retains membership, e2 gains it
        assert_eq!(
            state.get_relation("e1").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
        assert_eq!(
            state.get_relation("e2").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
    }

    #[tokio::test]
    async fn dropping_a_group_removes_membership() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        register_environment(&state, "e2", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        insert_static_group(&state, "g2", &["e2"]).await;
        let stack = insert_stack(&state, &["g1", "g2"], &["e1", "e2"]).await;

        let updated =
            updater.update_stack(&stack.id, compose_request(&["g1"], None)).await.unwrap();

        assert_eq!(updated.num_deployments, 1);
        assert_eq!(
            state.get_relation("e1").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
        assert!(!state.get_relation("e2").await.unwrap().edge_stacks.contains_key(&stack.id));
    }

    #[tokio::test]
    async fn version_bump_clears_the_status_map() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        let mut stack = insert_stack(&state, &["g1"], &["e1"]).await;
        stack.status.insert(
            "e1".to_string(),
            DeploymentStatus { kind: StatusKind::Ok, error: String::new(), time: 1700000000 },
        );
        state.update_edge_stack(&stack).await.unwrap();

        let updated =
            updater.update_stack(&stack.id, compose_request(&["g1"], Some(2))).await.unwrap();

        assert_eq!(updated.version, 2);
        assert!(updated.status.is_empty());

        let persisted = state.get_edge_stack(&stack.id).await.unwrap();
        assert_eq!(persisted.version, 2);
        assert!(persisted.status.is_empty());

        // Relation set unchanged
        assert_eq!(
            state.get_relation("e1").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
    }

    #[tokio::test]
    async fn unchanged_version_keeps_the_status_map() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        let mut stack = insert_stack(&state, &["g1"], &["e1"]).await;
        stack.status.insert(
            "e1".to_string(),
            DeploymentStatus { kind: StatusKind::Error, error: "boom".to_string(), time: 1 },
        );
        state.update_edge_stack(&stack).await.unwrap();

        // Same version explicitly
        let updated =
            updater.update_stack(&stack.id, compose_request(&["g1"], Some(1))).await.unwrap();
        assert_eq!(updated.status.len(), 1);

        // Version unset
        let updated = updater.update_stack(&stack.id, compose_request(&["g1"], None)).await.unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status.get("e1").unwrap().kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn type_switch_resets_content_fields_and_discards_artifacts() {
        let (state, updater, dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        register_environment(&state, "k1", EnvironmentType::EdgeAgentOnKubernetes).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        insert_static_group(&state, "gk", &["k1"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        // Lay down the compose artifact first
        updater.update_stack(&stack.id, compose_request(&["g1"], None)).await.unwrap();
        let compose_file = dir.path().join(&stack.id).join("docker-compose.yml");
        assert!(compose_file.exists());

        let request = UpdateRequest {
            stack_file_content: "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: web\n"
                .to_string(),
            version: Some(2),
            edge_groups: vec!["gk".to_string()],
            deployment_type: DeploymentType::Kubernetes,
            use_manifest_namespaces: true,
        };
        let updated = updater.update_stack(&stack.id, request).await.unwrap();

        assert_eq!(updated.deployment_type, DeploymentType::Kubernetes);
        assert!(updated.entry_point.is_empty());
        assert_eq!(updated.manifest_path, "manifest.yml");
        assert!(updated.use_manifest_namespaces);

        // Old compose file discarded, manifest written in its place
        assert!(!compose_file.exists());
        assert!(dir.path().join(&stack.id).join("manifest.yml").exists());

        // Relations moved to the kubernetes environment
        assert!(!state.get_relation("e1").await.unwrap().edge_stacks.contains_key(&stack.id));
        assert_eq!(
            state.get_relation("k1").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
    }

    #[tokio::test]
    async fn incompatible_environment_type_rejects_without_mutation() {
        let (state, updater, dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        let request = UpdateRequest {
            stack_file_content: "apiVersion: v1\n".to_string(),
            version: Some(2),
            edge_groups: vec!["g1".to_string()],
            deployment_type: DeploymentType::Kubernetes,
            use_manifest_namespaces: false,
        };
        let err = updater.update_stack(&stack.id, request).await.unwrap_err();
        assert!(matches!(err, FlotillaError::IncompatibleEnvironmentType { .. }));
        assert!(err.is_bad_request());

        // Stack record untouched
        let persisted = state.get_edge_stack(&stack.id).await.unwrap();
        assert_eq!(persisted.version, 1);
        assert_eq!(persisted.deployment_type, DeploymentType::Compose);
        assert_eq!(persisted.entry_point, "docker-compose.yml");

        // Relation untouched, no files written
        assert_eq!(
            state.get_relation("e1").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
        assert!(!dir.path().join(&stack.id).exists());
    }

    #[tokio::test]
    async fn empty_payload_fields_are_rejected() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        let mut request = compose_request(&["g1"], None);
        request.stack_file_content = String::new();
        let err = updater.update_stack(&stack.id, request).await.unwrap_err();
        assert!(matches!(err, FlotillaError::InvalidPayload { .. }));

        let request = compose_request(&[], None);
        let err = updater.update_stack(&stack.id, request).await.unwrap_err();
        assert!(matches!(err, FlotillaError::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn unknown_edge_group_in_payload_is_a_bad_request() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        let err = updater
            .update_stack(&stack.id, compose_request(&["g1", "ghost"], None))
            .await
            .unwrap_err();
        assert!(matches!(err, FlotillaError::EdgeGroupNotFound { .. }));
        assert!(err.is_bad_request());

        // Nothing mutated
        let persisted = state.get_edge_stack(&stack.id).await.unwrap();
        assert_eq!(persisted.edge_groups, vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn group_with_unregistered_environment_fails_internally() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        insert_static_group(&state, "g2", &["ghost"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        let err = updater
            .update_stack(&stack.id, compose_request(&["g1", "g2"], None))
            .await
            .unwrap_err();
        assert!(matches!(err, FlotillaError::RelationNotFound { .. }));
        assert!(!err.is_bad_request());

        // The stack's authoritative group list was not persisted
        let persisted = state.get_edge_stack(&stack.id).await.unwrap();
        assert_eq!(persisted.edge_groups, vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let (state, updater, _dir) = harness().await;

        register_environment(&state, "e1", EnvironmentType::EdgeAgentOnDocker).await;
        register_environment(&state, "e2", EnvironmentType::EdgeAgentOnDocker).await;
        insert_static_group(&state, "g1", &["e1"]).await;
        insert_static_group(&state, "g2", &["e2"]).await;
        let stack = insert_stack(&state, &["g1"], &["e1"]).await;

        let first =
            updater.update_stack(&stack.id, compose_request(&["g2"], Some(2))).await.unwrap();
        let second =
            updater.update_stack(&stack.id, compose_request(&["g2"], Some(2))).await.unwrap();

        assert_eq!(first.version, second.version);
        assert_eq!(first.num_deployments, second.num_deployments);
        assert!(!state.get_relation("e1").await.unwrap().edge_stacks.contains_key(&stack.id));
        assert_eq!(
            state.get_relation("e2").await.unwrap().edge_stacks.get(&stack.id),
            Some(&true)
        );
    }

    #[tokio::test]
    async fn missing_stack_is_reported_with_its_id() {
        let (_state, updater, _dir) = harness().await;

        let err = updater.update_stack("ghost", compose_request(&["g1"], None)).await.unwrap_err();
        assert!(matches!(err, FlotillaError::StackNotFound { .. }));
    }
}
