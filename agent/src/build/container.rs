//! Container image builds

use std::sync::Arc;

use tokio::fs;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::models::BuildResult;
use crate::tools::compose::Compose;

/// Builds images for a compose project without the layer cache
pub struct ContainerBuilder {
    compose: Arc<Compose>,
}

impl ContainerBuilder {
    pub fn new(compose: Arc<Compose>) -> Self {
        Self { compose }
    }

    pub async fn build(&self) -> Result<BuildResult, DeployError> {
        let started = Instant::now();

        let compose_path = self.compose.compose_path();
        if fs::metadata(&compose_path).await.is_err() {
            return Err(DeployError::Precondition(format!(
                "compose file not found: {}",
                compose_path.display()
            )));
        }

        let env_path = self.compose.env_path();
        if fs::metadata(&env_path).await.is_err() {
            warn!("Environment file not found: {}", env_path.display());
        }

        info!("Building images from {}", self.compose.compose_file());
        self.compose.build_no_cache().await?;

        Ok(BuildResult::succeeded(self.compose.work_dir(), started.elapsed()))
    }
}
