//! Core domain types for flotilla.

pub mod environment;
pub mod group;
pub mod relation;
pub mod stack;

// Re-exports
pub use environment::{Environment, EnvironmentType};
pub use group::{EdgeGroup, EnvironmentGroup};
pub use relation::Relation;
pub use stack::{
    DeploymentStatus, DeploymentType, EdgeStack, StatusKind, COMPOSE_FILE_DEFAULT_NAME,
    MANIFEST_FILE_DEFAULT_NAME,
};
