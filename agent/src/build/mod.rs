//! Build pipeline, one builder per project shape

pub mod container;
pub mod service;
pub mod static_site;

use std::time::Duration;

use tracing::{error, info};

use crate::errors::DeployError;
use crate::models::BuildResult;

pub use container::ContainerBuilder;
pub use service::{ServiceBuilder, ServiceKind};
pub use static_site::StaticSiteBuilder;

/// Build timing bounds
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// How long a transpiled service may take to produce its output directory
    pub output_wait_timeout: Duration,

    /// Delay between output directory checks
    pub output_poll_interval: Duration,

    /// Pause after the output appears, for late writes
    pub settle_delay: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output_wait_timeout: Duration::from_secs(120),
            output_poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(3),
        }
    }
}

/// Builder selected once per run from the project shape
pub enum Builder {
    Static(StaticSiteBuilder),
    Service(ServiceBuilder),
    Container(ContainerBuilder),
}

impl Builder {
    pub fn name(&self) -> &'static str {
        match self {
            Builder::Static(_) => "static site",
            Builder::Service(b) => match b.kind() {
                ServiceKind::Untranspiled => "service",
                ServiceKind::Transpiled => "transpiled service",
            },
            Builder::Container(_) => "containers",
        }
    }

    pub async fn build(&self) -> Result<BuildResult, DeployError> {
        info!("Building {}", self.name());

        let result = match self {
            Builder::Static(builder) => builder.build().await,
            Builder::Service(builder) => builder.build().await,
            Builder::Container(builder) => builder.build().await,
        };

        match &result {
            Ok(build) => info!(
                "Build of {} completed in {:.1}s, output: {}",
                self.name(),
                build.duration.as_secs_f64(),
                build.output_dir.display()
            ),
            Err(e) => error!("Build of {} failed: {}", self.name(), e),
        }
        result
    }
}
