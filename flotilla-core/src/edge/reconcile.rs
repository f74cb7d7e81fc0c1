//! Relation reconciliation.
//!
//! Brings the per-environment relation records in line with a stack's
//! newly resolved target set. Only the symmetric difference between old
//! and new sets is touched, which makes the operation idempotent:
//! applying the same delta twice leaves the records unchanged.
//!
//! Relation writes are the first irrevocable step of a stack update.
//! They are not rolled back on later failure; callers must only persist
//! the stack's new group list after this succeeds, so the authoritative
//! target set never runs ahead of the relation records.

use crate::error::Result;
use crate::state::StateManager;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Update relation records to match a stack's new target set.
///
/// Environments leaving the set lose their membership entry for the
/// stack; environments joining gain one. Environments in both sets are
/// left untouched. Removals are applied before additions. Any store
/// failure aborts with an internal error.
#[instrument(skip(state, old_set, new_set), fields(stack_id = %stack_id))]
pub async fn reconcile_relations(
    state: &StateManager,
    stack_id: &str,
    old_set: &HashSet<String>,
    new_set: &HashSet<String>,
) -> Result<()> {
    for environment_id in old_set.difference(new_set) {
        let mut relation = state.get_relation(environment_id).await?;
        relation.edge_stacks.remove(stack_id);
        state.update_relation(&relation).await?;
        debug!(%environment_id, "Removed stack from relation");
    }

    for environment_id in new_set.difference(old_set) {
        let mut relation = state.get_relation(environment_id).await?;
        relation.edge_stacks.insert(stack_id.to_string(), true);
        state.update_relation(&relation).await?;
        debug!(%environment_id, "Added stack to relation");
    }

    Ok(())
}
