//! Flotilla Core Library
//!
//! Shared types and services for the flotilla edge deployment
//! coordinator: stack, group and relation state, membership resolution,
//! and the stack update reconciliation sequence.

pub mod config;
pub mod convert;
pub mod edge;
pub mod error;
pub mod files;
pub mod observability;
pub mod paths;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use convert::{ComposeManifestConverter, ManifestConverter};
pub use edge::{StackUpdater, UpdateRequest};
pub use error::{FlotillaError, Result};
pub use files::FileStore;
pub use state::StateManager;
pub use types::{
    DeploymentStatus, DeploymentType, EdgeGroup, EdgeStack, Environment, EnvironmentGroup,
    EnvironmentType, Relation, StatusKind,
};
