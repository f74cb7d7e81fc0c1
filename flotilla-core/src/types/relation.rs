//! Relation domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-environment record of the stacks currently targeting it.
///
/// Agents poll this record to learn which stacks to pull. Created when
/// the environment is registered and kept for its lifetime; stack
/// updates only ever mutate the membership entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// Environment this record belongs to
    pub environment_id: String,

    /// Stack id to membership flag
    pub edge_stacks: HashMap<String, bool>,
}

impl Relation {
    /// Empty relation for a freshly registered environment.
    pub fn new(environment_id: impl Into<String>) -> Self {
        Self { environment_id: environment_id.into(), edge_stacks: HashMap::new() }
    }
}
