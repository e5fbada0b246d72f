//! npm dependency installation and scripts

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::fs;
use tracing::info;

use crate::errors::DeployError;
use crate::exec::{run_checked, CommandOutput, CommandRunner, CommandSpec};

const TOOL: &str = "npm";

/// The part of `package.json` the agent cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub scripts: HashMap<String, String>,
}

/// Install mode picked from the presence of a lock file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// `npm ci`, reproducible from `package-lock.json`
    Locked,

    /// `npm install`, best effort
    Resolve,
}

/// npm bound to one project directory
pub struct Npm {
    work_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Npm {
    pub fn new(work_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            work_dir: work_dir.into(),
            runner,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.work_dir.join("package.json")
    }

    pub async fn install_mode(&self) -> InstallMode {
        if fs::metadata(self.work_dir.join("package-lock.json")).await.is_ok() {
            InstallMode::Locked
        } else {
            InstallMode::Resolve
        }
    }

    pub async fn install(&self) -> Result<(), DeployError> {
        let spec = match self.install_mode().await {
            InstallMode::Locked => {
                info!("Installing dependencies with npm ci (lock file found)");
                CommandSpec::new("npm").args(["ci", "--prefer-offline", "--no-audit"])
            }
            InstallMode::Resolve => {
                info!("Installing dependencies with npm install (no lock file)");
                CommandSpec::new("npm").arg("install")
            }
        };
        run_checked(self.runner.as_ref(), TOOL, &spec.current_dir(&self.work_dir)).await?;
        info!("Dependencies installed");
        Ok(())
    }

    pub async fn read_manifest(&self) -> Result<PackageManifest, DeployError> {
        let path = self.manifest_path();
        let contents = fs::read_to_string(&path).await.map_err(|e| {
            DeployError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub async fn script_exists(&self, name: &str) -> Result<bool, DeployError> {
        Ok(self.read_manifest().await?.scripts.contains_key(name))
    }

    /// Fail with `MissingScript` unless the manifest declares the script
    pub async fn require_script(&self, name: &str) -> Result<(), DeployError> {
        if self.script_exists(name).await? {
            Ok(())
        } else {
            Err(DeployError::MissingScript {
                script: name.to_string(),
                manifest: self.manifest_path().display().to_string(),
            })
        }
    }

    pub async fn run_script(&self, name: &str) -> Result<CommandOutput, DeployError> {
        let spec = CommandSpec::new("npm")
            .args(["run", name])
            .current_dir(&self.work_dir);
        run_checked(self.runner.as_ref(), TOOL, &spec).await
    }
}
