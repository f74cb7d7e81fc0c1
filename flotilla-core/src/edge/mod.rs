//! Edge stack reconciliation core.
//!
//! Coordinates the coupled state a stack update touches: the resolved
//! target-environment set, the per-environment relation records, and the
//! stack's own versioned artifact and status map.

pub mod membership;
pub mod reconcile;
pub mod update;

#[cfg(test)]
mod tests;

pub use membership::{related_environments, RelationSnapshot};
pub use reconcile::reconcile_relations;
pub use update::{incompatible_environment, StackUpdater, UpdateRequest};
