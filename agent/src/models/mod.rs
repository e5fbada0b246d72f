//! Data model for a deployment run

pub mod build;
pub mod context;
pub mod repo;

pub use build::BuildResult;
pub use context::DeploymentContext;
pub use repo::{ProjectShape, RepoConfig};
