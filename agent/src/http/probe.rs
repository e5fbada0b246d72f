//! HTTP probe implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::errors::DeployError;

/// Issues a plain GET and reports the status code
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &str) -> Result<u16, DeployError>;
}

/// Probe backed by reqwest
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    /// Create a new probe with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, DeployError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<u16, DeployError> {
        let url = Url::parse(url)
            .map_err(|e| DeployError::ConfigError(format!("invalid health check URL '{}': {}", url, e)))?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        Ok(response.status().as_u16())
    }
}
