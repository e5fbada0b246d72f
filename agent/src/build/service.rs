//! Node service builds

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::BuildOptions;
use crate::errors::DeployError;
use crate::exec::CommandRunner;
use crate::filesys::Dir;
use crate::models::BuildResult;
use crate::tools::npm::Npm;

/// Directories a compiled service may emit
pub const SERVICE_OUTPUT_DIRS: &[&str] = &["dist", "build"];

/// Entry files tried after the configured hint
pub const ENTRY_CANDIDATES: &[&str] = &["main.js", "app.js", "index.js", "server.js"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Runs from its sources
    Untranspiled,

    /// Compiled into an output directory first
    Transpiled,
}

/// Installs dependencies and, for transpiled services, compiles and locates the entry file
pub struct ServiceBuilder {
    npm: Npm,
    kind: ServiceKind,
    entry_hint: String,
    options: BuildOptions,
}

impl ServiceBuilder {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        kind: ServiceKind,
        entry_hint: impl Into<String>,
        options: BuildOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            npm: Npm::new(work_dir, runner),
            kind,
            entry_hint: entry_hint.into(),
            options,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub async fn build(&self) -> Result<BuildResult, DeployError> {
        let started = Instant::now();
        let work_dir = self.npm.work_dir();

        self.npm.install().await?;

        if self.kind == ServiceKind::Untranspiled {
            let mut result = BuildResult::succeeded(work_dir, started.elapsed());
            let entry = work_dir.join(&self.entry_hint);
            if !self.entry_hint.is_empty() && fs::metadata(&entry).await.is_ok() {
                result = result.with_entry(entry);
            }
            return Ok(result);
        }

        self.npm.require_script("build").await?;
        self.npm.run_script("build").await?;

        let output_dir = self.wait_for_output(work_dir).await?;
        sleep(self.options.settle_delay).await;

        let entry = find_entry(&output_dir, &self.entry_hint)
            .await
            .ok_or_else(|| DeployError::NoEntryPoint(output_dir.display().to_string()))?;
        info!("Service entry point: {}", entry.display());

        Ok(BuildResult::succeeded(output_dir, started.elapsed()).with_entry(entry))
    }

    /// Poll for the compiler's output directory until the timeout runs out
    async fn wait_for_output(&self, work_dir: &Path) -> Result<PathBuf, DeployError> {
        let deadline = Instant::now() + self.options.output_wait_timeout;

        loop {
            for name in SERVICE_OUTPUT_DIRS {
                let dir = Dir::new(work_dir.join(name));
                if dir.exists().await {
                    debug!("Build output appeared in {}", dir.path().display());
                    return Ok(dir.path().to_path_buf());
                }
            }

            if Instant::now() >= deadline {
                return Err(DeployError::Timeout(format!(
                    "no {} directory in {} after {}s",
                    SERVICE_OUTPUT_DIRS.join(" or "),
                    work_dir.display(),
                    self.options.output_wait_timeout.as_secs()
                )));
            }
            debug!("Waiting for build output in {}", work_dir.display());
            sleep(self.options.output_poll_interval).await;
        }
    }
}

/// The configured hint first, then the conventional names
pub async fn find_entry(output_dir: &Path, hint: &str) -> Option<PathBuf> {
    let hint = hint.trim();
    let candidates = std::iter::once(hint)
        .filter(|h| !h.is_empty())
        .chain(ENTRY_CANDIDATES.iter().copied().filter(|c| *c != hint));

    for candidate in candidates {
        let path = output_dir.join(candidate);
        if fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Some(path);
        }
    }
    None
}
