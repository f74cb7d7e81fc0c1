//! Group domain types.

use serde::{Deserialize, Serialize};

/// Administrative grouping every environment belongs to. Its tags count
/// toward dynamic edge-group matching alongside the environment's own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentGroup {
    /// Unique group identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Tags attached to the group
    pub tag_ids: Vec<String>,
}

/// Named rule selecting the environments a stack targets.
///
/// Static groups list their members; dynamic groups match environments
/// by tag at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeGroup {
    /// Unique group identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Whether membership is computed from tags
    pub dynamic: bool,

    /// Tags a dynamic group matches on
    pub tag_ids: Vec<String>,

    /// Explicit members of a static group
    pub environment_ids: Vec<String>,

    /// Dynamic matching mode: any tag when set, all tags otherwise
    pub partial_match: bool,
}
