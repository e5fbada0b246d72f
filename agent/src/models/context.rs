//! Per-run deployment context

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::DeployError;
use crate::models::repo::RepoConfig;
use crate::storage::registry::RepoRegistry;
use crate::utils::deployment_id;

pub const ENV_REPO_NAME: &str = "GITHUB_REPO_NAME";
pub const ENV_BRANCH: &str = "GITHUB_BRANCH";
pub const ENV_REPO_OWNER: &str = "GITHUB_REPO_OWNER";
pub const ENV_PUSHER: &str = "GITHUB_PUSHER";
pub const ENV_COMMIT: &str = "GITHUB_COMMIT";
pub const ENV_REPO_FULL_NAME: &str = "GITHUB_REPO_FULL_NAME";

/// Everything one run knows about what it deploys. Never mutated after construction.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentContext {
    pub repo_name: String,
    pub branch: String,
    pub repo_owner: String,
    pub pusher: String,
    pub commit: String,
    pub repo_full_name: String,
    pub deployment_id: String,
    pub started_at: DateTime<Utc>,
    pub config: RepoConfig,
}

impl DeploymentContext {
    /// Build the context from the `GITHUB_*` environment of the trigger
    pub fn from_env(registry: &RepoRegistry) -> Result<Self, DeployError> {
        Self::from_lookup(|key| std::env::var(key).ok(), registry)
    }

    /// Build the context from any key lookup. Every variable is required and non-empty.
    pub fn from_lookup<F>(lookup: F, registry: &RepoRegistry) -> Result<Self, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| -> Result<String, DeployError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DeployError::Precondition(format!("{} is not set", key)))
        };

        let repo_name = require(ENV_REPO_NAME)?;
        let branch = require(ENV_BRANCH)?;
        let repo_owner = require(ENV_REPO_OWNER)?;
        let pusher = require(ENV_PUSHER)?;
        let commit = require(ENV_COMMIT)?;
        let repo_full_name = require(ENV_REPO_FULL_NAME)?;

        let started_at = Utc::now();
        let config = registry.lookup(&repo_name, &repo_owner);

        Ok(Self {
            repo_name,
            branch,
            repo_owner,
            pusher,
            commit,
            repo_full_name,
            deployment_id: deployment_id(started_at, std::process::id()),
            started_at,
            config,
        })
    }

    /// First seven characters of the commit
    pub fn short_commit(&self) -> &str {
        match self.commit.char_indices().nth(7) {
            Some((idx, _)) => &self.commit[..idx],
            None => &self.commit,
        }
    }

    /// Message for the safety stash created before pulling
    pub fn stash_name(&self) -> String {
        format!("deployment-auto-stash-{}", self.deployment_id)
    }
}
