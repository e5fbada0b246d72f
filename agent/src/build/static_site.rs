//! Static site builds

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use crate::errors::DeployError;
use crate::exec::CommandRunner;
use crate::filesys::Dir;
use crate::models::BuildResult;
use crate::tools::npm::Npm;

/// Directories a frontend build may emit, in preference order
pub const OUTPUT_DIRS: &[&str] = &["dist", "build", "out"];

/// First output directory that exists and has contents
pub async fn find_output_dir(work_dir: &Path) -> Result<Option<PathBuf>, DeployError> {
    for name in OUTPUT_DIRS {
        let dir = Dir::new(work_dir.join(name));
        if dir.exists().await && !dir.is_empty().await? {
            debug!("Found build output in {}", dir.path().display());
            return Ok(Some(dir.path().to_path_buf()));
        }
    }
    Ok(None)
}

/// npm install, npm run build, locate the output
pub struct StaticSiteBuilder {
    npm: Npm,
}

impl StaticSiteBuilder {
    pub fn new(work_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            npm: Npm::new(work_dir, runner),
        }
    }

    pub async fn build(&self) -> Result<BuildResult, DeployError> {
        let started = Instant::now();
        let work_dir = self.npm.work_dir();

        self.npm.install().await?;
        self.npm.require_script("build").await?;
        self.npm.run_script("build").await?;

        let output_dir = find_output_dir(work_dir)
            .await?
            .ok_or_else(|| DeployError::NoBuildOutput(work_dir.display().to_string()))?;

        Ok(BuildResult::succeeded(output_dir, started.elapsed()))
    }
}
