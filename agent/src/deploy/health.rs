//! Post-deploy verification

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::http::HttpProbe;
use crate::tools::pm2::{Pm2, ProcessState};

/// HTTP probing bounds
#[derive(Debug, Clone)]
pub struct HealthOptions {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

/// Read-only checks of a deployed release
pub struct HealthVerifier<'a> {
    pm2: &'a Pm2,
    probe: &'a dyn HttpProbe,
    options: HealthOptions,
}

impl<'a> HealthVerifier<'a> {
    pub fn new(pm2: &'a Pm2, probe: &'a dyn HttpProbe, options: HealthOptions) -> Self {
        Self { pm2, probe, options }
    }

    /// The named process must be exactly online
    pub async fn check_supervisor(&self, name: &str) -> Result<(), DeployError> {
        let state = self.pm2.status(name).await?;
        if state != ProcessState::Online {
            return Err(DeployError::HealthCheckFailed(format!(
                "pm2 app '{}' is {}",
                name, state
            )));
        }
        info!("pm2 app '{}' is online", name);
        Ok(())
    }

    /// GET the URL until it answers 200 or attempts run out
    pub async fn check_http(&self, url: &str) -> Result<(), DeployError> {
        let mut last = String::from("no attempt made");

        for attempt in 1..=self.options.attempts {
            match self.probe.get(url).await {
                Ok(200) => {
                    info!("{} answered 200", url);
                    return Ok(());
                }
                Ok(status) => last = format!("{} returned status {}", url, status),
                Err(e) => last = format!("{} unreachable: {}", url, e),
            }
            warn!("Health check attempt {}/{}: {}", attempt, self.options.attempts, last);

            if attempt < self.options.attempts {
                sleep(self.options.delay).await;
            }
        }

        Err(DeployError::HealthCheckFailed(last))
    }

    /// Supervisor check when a process is named, then `http://<domain>/` when a domain is set
    pub async fn verify(&self, domain: Option<&str>, process: Option<&str>) -> Result<(), DeployError> {
        if let Some(name) = process {
            self.check_supervisor(name).await?;
        }

        match domain {
            Some(domain) => self.check_http(&format!("http://{}/", domain)).await,
            None => {
                info!("No domain configured, skipping HTTP health check");
                Ok(())
            }
        }
    }
}
