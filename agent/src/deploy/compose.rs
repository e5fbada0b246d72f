//! Docker Compose deployment

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::errors::DeployError;
use crate::tools::compose::Compose;

/// Migration command used when the repository configures none
pub const DEFAULT_MIGRATION_COMMAND: &str = "npx prisma migrate deploy";

/// Container deployment timing and diagnostics
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Pause after `up` before the first container check
    pub settle_delay: Duration,

    /// Log lines shown when a deploy stage fails
    pub failure_log_lines: usize,

    /// Log lines of the migration service shown when migrations fail
    pub migration_log_lines: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            failure_log_lines: 50,
            migration_log_lines: 100,
        }
    }
}

/// Replaces the running containers of one compose project
pub struct ContainerDeployment<'a> {
    compose: &'a Compose,
    options: ComposeOptions,
}

impl<'a> ContainerDeployment<'a> {
    pub fn new(compose: &'a Compose, options: ComposeOptions) -> Self {
        Self { compose, options }
    }

    /// Stop the old containers, start the new ones and check them
    pub async fn deploy(&self) -> Result<(), DeployError> {
        info!("Stopping existing containers");
        if let Err(e) = self.compose.down(true).await {
            warn!("Failed to stop containers (they may not exist yet): {}", e);
        }

        info!("Starting containers");
        self.compose.up().await?;

        info!("Waiting {}s for containers to settle", self.options.settle_delay.as_secs());
        sleep(self.options.settle_delay).await;

        self.compose.check_health().await
    }

    /// Run migrations inside the service container, dumping its logs on failure
    pub async fn run_migrations(&self, command: Option<&str>, service: &str) -> Result<(), DeployError> {
        let command = command
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_MIGRATION_COMMAND);
        info!("Running migrations in '{}': {}", service, command);

        match self.compose.exec(service, command).await {
            Ok(output) => {
                info!("Migrations completed\n{}", output.combined());
                Ok(())
            }
            Err(e) => {
                error!("Migrations failed: {}", e);
                self.dump_logs(Some(service), self.options.migration_log_lines).await;
                Err(e)
            }
        }
    }

    /// Log recent container output after a failed stage
    pub async fn dump_failure_logs(&self) {
        self.dump_logs(None, self.options.failure_log_lines).await;
    }

    async fn dump_logs(&self, service: Option<&str>, lines: usize) {
        match self.compose.logs(service, lines).await {
            Ok(logs) => error!("Container logs ({}):\n{}", service.unwrap_or("all services"), logs),
            Err(e) => warn!("Could not read container logs: {}", e),
        }
    }

    /// Take the project down after a failed deploy
    pub async fn rollback(&self) -> Result<(), DeployError> {
        warn!("Rolling back container deployment");
        self.compose.down(false).await?;
        info!("Container rollback completed");
        Ok(())
    }
}
