//! Docker Compose project operations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::exec::{run_checked, CommandOutput, CommandRunner, CommandSpec};

const TOOL: &str = "docker-compose";

pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.prod.yml";
pub const DEFAULT_ENV_FILE: &str = ".env.production";

/// A compose project rooted at one directory
pub struct Compose {
    program: Vec<String>,
    work_dir: PathBuf,
    compose_file: String,
    env_file: String,
    runner: Arc<dyn CommandRunner>,
}

impl Compose {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        compose_file: Option<&str>,
        env_file: Option<&str>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            program: vec!["docker-compose".to_string()],
            work_dir: work_dir.into(),
            compose_file: compose_file
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_COMPOSE_FILE)
                .to_string(),
            env_file: env_file
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_ENV_FILE)
                .to_string(),
            runner,
        }
    }

    /// Use the `docker compose` plugin when it is available, `docker-compose` otherwise
    pub async fn detect_program(mut self) -> Self {
        let probe = CommandSpec::new("docker").args(["compose", "version"]);
        if matches!(self.runner.output(&probe).await, Ok(output) if output.success) {
            debug!("Using 'docker compose'");
            self.program = vec!["docker".to_string(), "compose".to_string()];
        } else {
            debug!("'docker compose' unavailable, using 'docker-compose'");
        }
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn compose_file(&self) -> &str {
        &self.compose_file
    }

    pub fn compose_path(&self) -> PathBuf {
        self.work_dir.join(&self.compose_file)
    }

    pub fn env_path(&self) -> PathBuf {
        self.work_dir.join(&self.env_file)
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(&self.program[0])
            .args(self.program[1..].iter().cloned())
            .args(["-f".to_string(), self.compose_file.clone()])
            .args(args)
            .current_dir(&self.work_dir)
    }

    pub async fn build_no_cache(&self) -> Result<CommandOutput, DeployError> {
        run_checked(self.runner.as_ref(), TOOL, &self.command(["build", "--no-cache"])).await
    }

    pub async fn down(&self, remove_orphans: bool) -> Result<(), DeployError> {
        let spec = if remove_orphans {
            self.command(["down", "--remove-orphans"])
        } else {
            self.command(["down"])
        };
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(())
    }

    /// Start containers detached, rebuilding images as needed
    pub async fn up(&self) -> Result<(), DeployError> {
        run_checked(self.runner.as_ref(), TOOL, &self.command(["up", "-d", "--build"])).await?;
        Ok(())
    }

    /// Run a command inside a running service container
    pub async fn exec(&self, service: &str, command: &str) -> Result<CommandOutput, DeployError> {
        let spec = self
            .command(["exec", "-T", service])
            .args(command.split_whitespace());
        run_checked(self.runner.as_ref(), TOOL, &spec).await
    }

    fn uses_plugin(&self) -> bool {
        self.program.len() > 1
    }

    /// List the project's containers, stopped ones included.
    /// `docker-compose` always lists them; the plugin needs `-a`.
    pub async fn ps(&self) -> Result<String, DeployError> {
        let spec = if self.uses_plugin() {
            self.command(["ps", "-a"])
        } else {
            self.command(["ps"])
        };
        let output = run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(output.combined())
    }

    /// Every listed container must be up, none exited or restarting
    pub async fn check_health(&self) -> Result<(), DeployError> {
        let listing = self.ps().await?;
        let unhealthy = listing.lines().any(|line| {
            line.contains("Exit") || line.contains("Restarting") || line.contains("unhealthy")
        });
        if unhealthy {
            return Err(DeployError::HealthCheckFailed(format!(
                "some containers are not healthy:\n{}",
                listing
            )));
        }
        info!("All containers are running");
        Ok(())
    }

    pub async fn logs(&self, service: Option<&str>, tail: usize) -> Result<String, DeployError> {
        let mut spec = self.command(["logs"]);
        if let Some(service) = service {
            spec = spec.arg(service);
        }
        if tail > 0 {
            spec = spec.args(["--tail".to_string(), tail.to_string()]);
        }
        let output = run_checked(self.runner.as_ref(), TOOL, &spec).await?;
        Ok(output.combined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_command_lines() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let compose = Compose::new("/srv/app", None, None, runner.clone());

        compose.build_no_cache().await.unwrap();
        compose.down(true).await.unwrap();
        compose.up().await.unwrap();
        compose.exec("api", "npx prisma migrate deploy").await.unwrap();
        compose.logs(Some("api"), 100).await.unwrap();

        assert_eq!(
            runner.lines(),
            vec![
                "docker-compose -f docker-compose.prod.yml build --no-cache",
                "docker-compose -f docker-compose.prod.yml down --remove-orphans",
                "docker-compose -f docker-compose.prod.yml up -d --build",
                "docker-compose -f docker-compose.prod.yml exec -T api npx prisma migrate deploy",
                "docker-compose -f docker-compose.prod.yml logs api --tail 100",
            ]
        );
        assert!(runner
            .calls()
            .iter()
            .all(|c| c.cwd.as_deref() == Some(Path::new("/srv/app"))));
    }

    #[tokio::test]
    async fn test_detects_compose_plugin() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let compose = Compose::new("/srv/app", Some("compose.yml"), None, runner.clone())
            .detect_program()
            .await;
        compose.ps().await.unwrap();
        assert_eq!(
            runner.lines(),
            vec!["docker compose version", "docker compose -f compose.yml ps -a"]
        );
    }

    #[tokio::test]
    async fn test_plugin_health_sees_stopped_containers() {
        // The plugin's plain `ps` only lists running containers
        let runner = Arc::new(ScriptedRunner::new(|spec| match spec.line().as_str() {
            "docker compose -f docker-compose.prod.yml ps" => CommandOutput::ok("NAME   STATUS\n"),
            "docker compose -f docker-compose.prod.yml ps -a" => {
                CommandOutput::ok("NAME   STATUS\napp-api-1   Exited (1) 5 seconds ago\n")
            }
            _ => CommandOutput::ok(""),
        }));
        let compose = Compose::new("/srv/app", None, None, runner.clone())
            .detect_program()
            .await;

        let err = compose.check_health().await.unwrap_err();
        assert!(matches!(err, DeployError::HealthCheckFailed(_)));
        assert_eq!(
            runner.lines().last().map(String::as_str),
            Some("docker compose -f docker-compose.prod.yml ps -a")
        );
    }

    #[tokio::test]
    async fn test_health_flags_exited_containers() {
        let runner = Arc::new(ScriptedRunner::new(|_| {
            CommandOutput::ok("NAME   STATUS\napp-api-1   Up 10 seconds\napp-db-1   Exit 1\n")
        }));
        let compose = Compose::new("/srv/app", None, None, runner);
        let err = compose.check_health().await.unwrap_err();
        assert!(matches!(err, DeployError::HealthCheckFailed(_)));
    }
}
