//! pm2 process supervisor

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::exec::{run_checked, CommandRunner, CommandSpec};

const TOOL: &str = "pm2";

/// Supervisor view of one named process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    /// No process registered under the name
    NotFound,
    Online,
    Stopped,
    Stopping,
    Errored,
    /// Transitional, pm2 is bringing the process up
    Launching,
    /// The status query itself failed, or pm2 reported something unrecognized
    Unknown,
}

impl ProcessState {
    pub fn from_status(status: &str) -> Self {
        match status.trim() {
            "online" => ProcessState::Online,
            "stopped" => ProcessState::Stopped,
            "stopping" => ProcessState::Stopping,
            "errored" => ProcessState::Errored,
            "launching" | "waiting restart" => ProcessState::Launching,
            _ => ProcessState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::NotFound => "not-found",
            ProcessState::Online => "online",
            ProcessState::Stopped => "stopped",
            ProcessState::Stopping => "stopping",
            ProcessState::Errored => "errored",
            ProcessState::Launching => "launching",
            ProcessState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `pm2 jlist`
#[derive(Debug, Clone, Deserialize)]
pub struct Pm2Process {
    pub name: String,
    #[serde(default)]
    pub pm2_env: Pm2Env,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pm2Env {
    #[serde(default)]
    pub status: String,
}

/// How to bring a process up when it is not registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSpec {
    /// Process name pm2 reports
    pub name: String,

    /// Directory the start command runs from
    pub work_dir: PathBuf,

    /// Ecosystem file, relative to `work_dir`
    pub descriptor: Option<String>,

    /// Script to run when no ecosystem file is declared
    pub entry: Option<PathBuf>,
}

/// Parse `pm2 jlist`, skipping any banner pm2 prints ahead of the JSON
pub fn parse_process_list(raw: &str) -> Result<Vec<Pm2Process>, DeployError> {
    let start = raw.find('[').ok_or_else(|| {
        DeployError::tool(TOOL, "process list is not a JSON array", raw.to_string())
    })?;
    Ok(serde_json::from_str(&raw[start..])?)
}

/// pm2 command wrapper
pub struct Pm2 {
    runner: Arc<dyn CommandRunner>,
}

impl Pm2 {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn is_installed(&self) -> bool {
        let spec = CommandSpec::new("pm2").arg("--version");
        matches!(self.runner.output(&spec).await, Ok(output) if output.success)
    }

    pub async fn list(&self) -> Result<Vec<Pm2Process>, DeployError> {
        let spec = CommandSpec::new("pm2").arg("jlist");
        let output = run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        parse_process_list(&output.stdout)
    }

    pub async fn status(&self, name: &str) -> Result<ProcessState, DeployError> {
        let processes = self.list().await?;
        let state = processes
            .iter()
            .find(|p| p.name == name)
            .map(|p| ProcessState::from_status(&p.pm2_env.status))
            .unwrap_or(ProcessState::NotFound);
        debug!("pm2 process '{}' is {}", name, state);
        Ok(state)
    }

    pub async fn start(&self, start: &StartSpec) -> Result<(), DeployError> {
        let spec = match (&start.descriptor, &start.entry) {
            (Some(descriptor), _) => {
                info!("Starting pm2 app '{}' from {}", start.name, descriptor);
                CommandSpec::new("pm2").args(["start", descriptor.as_str()])
            }
            (None, Some(entry)) => {
                info!("Starting pm2 app '{}' from {}", start.name, entry.display());
                CommandSpec::new("pm2").args([
                    "start".to_string(),
                    entry.display().to_string(),
                    "--name".to_string(),
                    start.name.clone(),
                ])
            }
            (None, None) => {
                return Err(DeployError::ConfigError(format!(
                    "no ecosystem file or entry point to start '{}'",
                    start.name
                )))
            }
        };
        run_checked(self.runner.as_ref(), TOOL, &spec.current_dir(&start.work_dir)).await?;
        Ok(())
    }

    pub async fn restart(&self, name: &str) -> Result<(), DeployError> {
        info!("Restarting pm2 app '{}'", name);
        let spec = CommandSpec::new("pm2").args(["restart", name]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), DeployError> {
        info!("Deleting pm2 app '{}'", name);
        let spec = CommandSpec::new("pm2").args(["delete", name]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }

    /// Persist the process list so it survives a reboot
    pub async fn save(&self) -> Result<(), DeployError> {
        let spec = CommandSpec::new("pm2").arg("save");
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }
}
