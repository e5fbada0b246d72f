//! Git working copy operations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::exec::{run_checked, CommandRunner, CommandSpec};

const TOOL: &str = "git";

/// Clone URL for a GitHub `owner/name` repository
pub fn github_url(full_name: &str) -> String {
    format!("https://github.com/{}.git", full_name)
}

/// Local and remote branch tips
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revisions {
    pub local: String,
    pub remote: String,
}

impl Revisions {
    /// Identity comparison, never by date
    pub fn has_updates(&self) -> bool {
        self.local != self.remote
    }
}

/// A local checkout tracking one remote branch
pub struct GitRepo {
    repo_dir: PathBuf,
    branch: String,
    runner: Arc<dyn CommandRunner>,
}

impl GitRepo {
    pub fn new(repo_dir: impl Into<PathBuf>, branch: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            branch: branch.into(),
            runner,
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new("git").current_dir(&self.repo_dir)
    }

    /// Clone the repository when the working copy is missing. Returns true if a clone happened.
    pub async fn clone_if_missing(&self, remote_url: &str) -> Result<bool, DeployError> {
        if fs::metadata(&self.repo_dir).await.is_ok() {
            debug!("Repository already exists at {}, skipping clone", self.repo_dir.display());
            return Ok(false);
        }

        warn!("Repository not found, cloning from {}", remote_url);
        if let Some(parent) = self.repo_dir.parent() {
            fs::create_dir_all(parent).await?;
        }

        let spec = CommandSpec::new("git").args([
            "clone".to_string(),
            "--branch".to_string(),
            self.branch.clone(),
            remote_url.to_string(),
            self.repo_dir.display().to_string(),
        ]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;

        info!("Repository cloned to {}", self.repo_dir.display());
        Ok(true)
    }

    /// Require an existing directory that is a git checkout
    pub async fn validate(&self) -> Result<(), DeployError> {
        let is_dir = fs::metadata(&self.repo_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(DeployError::NotARepository(format!(
                "{} does not exist",
                self.repo_dir.display()
            )));
        }

        if fs::metadata(self.repo_dir.join(".git")).await.is_err() {
            return Err(DeployError::NotARepository(self.repo_dir.display().to_string()));
        }

        Ok(())
    }

    pub async fn has_uncommitted_changes(&self) -> Result<bool, DeployError> {
        let spec = self.git().args(["status", "--porcelain"]);
        let output = run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(!output.stdout.trim().is_empty())
    }

    /// Stash tracked and untracked edits under a recognizable message
    pub async fn stash_push(&self, message: &str) -> Result<(), DeployError> {
        let spec = self
            .git()
            .args(["stash", "push", "--include-untracked", "-m", message]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }

    pub async fn stash_pop(&self) -> Result<(), DeployError> {
        let spec = self.git().args(["stash", "pop"]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }

    pub async fn fetch(&self) -> Result<(), DeployError> {
        let spec = self.git().arg("fetch");
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }

    pub async fn rev_parse(&self, rev: &str) -> Result<String, DeployError> {
        let spec = self.git().args(["rev-parse", rev]);
        let output = run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Compare local HEAD against the fetched remote branch tip
    pub async fn revisions(&self) -> Result<Revisions, DeployError> {
        let local = self.rev_parse("@").await?;
        let remote = self.rev_parse(&format!("origin/{}", self.branch)).await?;
        Ok(Revisions { local, remote })
    }

    pub async fn pull(&self) -> Result<(), DeployError> {
        let spec = self.git().args(["pull", "origin", &self.branch]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }
}
