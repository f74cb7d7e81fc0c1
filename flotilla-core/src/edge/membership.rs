//! Edge group membership resolution.
//!
//! Computes the set of environments a stack targets from its edge group
//! list. Membership is recomputed on every reconciliation rather than
//! cached; the inputs are immutable snapshots and resolution is pure.

use crate::error::{FlotillaError, Result};
use crate::types::{EdgeGroup, Environment, EnvironmentGroup};
use std::collections::{HashMap, HashSet};

/// Immutable snapshot of everything membership resolution reads.
#[derive(Debug, Clone, Default)]
pub struct RelationSnapshot {
    /// All known environments.
    pub environments: Vec<Environment>,
    /// Environment groups by id.
    pub environment_groups: HashMap<String, EnvironmentGroup>,
    /// Edge groups by id.
    pub edge_groups: HashMap<String, EdgeGroup>,
}

impl RelationSnapshot {
    /// Load a snapshot from the store.
    pub async fn fetch(state: &crate::state::StateManager) -> Result<Self> {
        let environments = state.list_environments().await?;
        let environment_groups = state
            .list_environment_groups()
            .await?
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();
        let edge_groups =
            state.list_edge_groups().await?.into_iter().map(|g| (g.id.clone(), g)).collect();

        Ok(Self { environments, environment_groups, edge_groups })
    }
}

/// Resolve the environments targeted by the given edge groups.
///
/// Static groups contribute their listed members; dynamic groups match
/// environments by tag (any tag when `partial_match` is set, all tags
/// otherwise). A dynamic group with no tags matches nothing.
///
/// Fails with `EdgeGroupNotFound` if a referenced group does not exist;
/// the caller must abort before any mutation.
pub fn related_environments(
    group_ids: &[String],
    snapshot: &RelationSnapshot,
) -> Result<HashSet<String>> {
    let mut related = HashSet::new();

    for group_id in group_ids {
        let group = snapshot
            .edge_groups
            .get(group_id)
            .ok_or_else(|| FlotillaError::EdgeGroupNotFound { group_id: group_id.clone() })?;

        if !group.dynamic {
            related.extend(group.environment_ids.iter().cloned());
            continue;
        }

        for environment in &snapshot.environments {
            if environment_matches(environment, group, &snapshot.environment_groups) {
                related.insert(environment.id.clone());
            }
        }
    }

    Ok(related)
}

/// Whether an environment matches a dynamic group's tag rule.
///
/// The environment's effective tags are its own unioned with those of
/// its environment group.
fn environment_matches(
    environment: &Environment,
    group: &EdgeGroup,
    environment_groups: &HashMap<String, EnvironmentGroup>,
) -> bool {
    if group.tag_ids.is_empty() {
        return false;
    }

    let mut tags: HashSet<&str> = environment.tag_ids.iter().map(String::as_str).collect();
    if let Some(env_group) = environment_groups.get(&environment.group_id) {
        tags.extend(env_group.tag_ids.iter().map(String::as_str));
    }

    if group.partial_match {
        group.tag_ids.iter().any(|t| tags.contains(t.as_str()))
    } else {
        group.tag_ids.iter().all(|t| tags.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvironmentType;

    fn environment(id: &str, group_id: &str, tags: &[&str]) -> Environment {
        Environment {
            id: id.to_string(),
            name: id.to_string(),
            environment_type: EnvironmentType::EdgeAgentOnDocker,
            group_id: group_id.to_string(),
            tag_ids: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn static_group(id: &str, members: &[&str]) -> EdgeGroup {
        EdgeGroup {
            id: id.to_string(),
            name: id.to_string(),
            dynamic: false,
            tag_ids: vec![],
            environment_ids: members.iter().map(|m| m.to_string()).collect(),
            partial_match: false,
        }
    }

    fn dynamic_group(id: &str, tags: &[&str], partial_match: bool) -> EdgeGroup {
        EdgeGroup {
            id: id.to_string(),
            name: id.to_string(),
            dynamic: true,
            tag_ids: tags.iter().map(|t| t.to_string()).collect(),
            environment_ids: vec![],
            partial_match,
        }
    }

    fn snapshot(environments: Vec<Environment>, groups: Vec<EdgeGroup>) -> RelationSnapshot {
        RelationSnapshot {
            environments,
            environment_groups: HashMap::new(),
            edge_groups: groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
        }
    }

    #[test]
    fn static_groups_union_their_members() {
        let snap = snapshot(
            vec![],
            vec![static_group("g1", &["e1", "e2"]), static_group("g2", &["e2", "e3"])],
        );

        let related =
            related_environments(&["g1".to_string(), "g2".to_string()], &snap).unwrap();
        assert_eq!(related, HashSet::from(["e1".into(), "e2".into(), "e3".into()]));
    }

    #[test]
    fn unknown_group_is_rejected() {
        let snap = snapshot(vec![], vec![]);

        let err = related_environments(&["missing".to_string()], &snap).unwrap_err();
        assert!(matches!(err, FlotillaError::EdgeGroupNotFound { .. }));
        assert!(err.is_bad_request());
    }

    #[test]
    fn dynamic_all_tags_requires_every_tag() {
        let snap = snapshot(
            vec![
                environment("e1", "default", &["region:eu", "tier:prod"]),
                environment("e2", "default", &["region:eu"]),
            ],
            vec![dynamic_group("g1", &["region:eu", "tier:prod"], false)],
        );

        let related = related_environments(&["g1".to_string()], &snap).unwrap();
        assert_eq!(related, HashSet::from(["e1".into()]));
    }

    #[test]
    fn dynamic_partial_match_takes_any_tag() {
        let snap = snapshot(
            vec![
                environment("e1", "default", &["region:eu"]),
                environment("e2", "default", &["tier:prod"]),
                environment("e3", "default", &["region:us"]),
            ],
            vec![dynamic_group("g1", &["region:eu", "tier:prod"], true)],
        );

        let related = related_environments(&["g1".to_string()], &snap).unwrap();
        assert_eq!(related, HashSet::from(["e1".into(), "e2".into()]));
    }

    #[test]
    fn dynamic_group_without_tags_matches_nothing() {
        let snap = snapshot(
            vec![environment("e1", "default", &[])],
            vec![dynamic_group("g1", &[], true)],
        );

        let related = related_environments(&["g1".to_string()], &snap).unwrap();
        assert!(related.is_empty());
    }

    #[test]
    fn environment_group_tags_count_toward_matching() {
        let mut snap = snapshot(
            vec![environment("e1", "eg1", &[])],
            vec![dynamic_group("g1", &["region:eu"], false)],
        );
        snap.environment_groups.insert(
            "eg1".to_string(),
            EnvironmentGroup {
                id: "eg1".to_string(),
                name: "eu fleet".to_string(),
                tag_ids: vec!["region:eu".to_string()],
            },
        );

        let related = related_environments(&["g1".to_string()], &snap).unwrap();
        assert_eq!(related, HashSet::from(["e1".into()]));
    }
}
