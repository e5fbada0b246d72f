//! Source synchronization

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::exec::CommandRunner;
use crate::models::DeploymentContext;
use crate::tools::git::{github_url, GitRepo};

/// Brings the working copy to the remote branch tip, keeping local edits aside meanwhile
pub struct SourceSync {
    repo: GitRepo,
    remote_url: String,
    stash_message: String,
    /// Set while a stash made by this run is waiting to be reapplied
    stash: Option<String>,
}

impl SourceSync {
    pub fn new(ctx: &DeploymentContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            repo: GitRepo::new(&ctx.config.repo_dir, &ctx.branch, runner),
            remote_url: github_url(&ctx.repo_full_name),
            stash_message: ctx.stash_name(),
            stash: None,
        }
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    pub fn has_pending_stash(&self) -> bool {
        self.stash.is_some()
    }

    /// Clone if missing, validate the checkout and stash uncommitted edits
    pub async fn prepare(&mut self) -> Result<(), DeployError> {
        self.repo.clone_if_missing(&self.remote_url).await?;
        self.repo.validate().await?;

        if self.repo.has_uncommitted_changes().await? {
            warn!("Uncommitted changes in {}, stashing", self.repo.repo_dir().display());
            self.repo.stash_push(&self.stash_message).await?;
            self.stash = Some(self.stash_message.clone());
        }
        Ok(())
    }

    pub async fn fetch(&self) -> Result<(), DeployError> {
        info!("Fetching from origin");
        self.repo.fetch().await
    }

    /// True when `origin/<branch>` differs from the local HEAD
    pub async fn has_updates(&self) -> Result<bool, DeployError> {
        let revisions = self.repo.revisions().await?;
        info!("Local: {} Remote: {}", revisions.local, revisions.remote);
        Ok(revisions.has_updates())
    }

    /// Pull the branch. On failure the stash is put back before the error surfaces.
    pub async fn pull(&mut self) -> Result<(), DeployError> {
        info!("Pulling origin/{}", self.repo.branch());
        if let Err(e) = self.repo.pull().await {
            self.restore_stash().await;
            return Err(e);
        }
        info!("Pull completed");
        Ok(())
    }

    /// Reapply this run's stash, at most once. Failures are logged.
    pub async fn restore_stash(&mut self) {
        let Some(message) = self.stash.take() else {
            return;
        };
        info!("Restoring stashed changes ({})", message);
        if let Err(e) = self.repo.stash_pop().await {
            warn!("Could not reapply stash '{}': {}", message, e);
        }
    }
}
