//! Scripted HTTP probe for tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::http::probe::HttpProbe;

/// Answers every GET with a fixed status and records the URLs
pub(crate) struct ScriptedProbe {
    status: u16,
    urls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub(crate) fn new(status: u16) -> Self {
        Self {
            status,
            urls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpProbe for ScriptedProbe {
    async fn get(&self, url: &str) -> Result<u16, DeployError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.status)
    }
}
