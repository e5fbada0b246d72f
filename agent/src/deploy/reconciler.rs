//! Drives pm2 into running the service

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::tools::pm2::{Pm2, ProcessState, StartSpec};

/// Reconciliation bounds
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub max_attempts: u32,

    /// Pause after each attempt
    pub interval: Duration,

    /// Pause between the initial start or restart and the first check
    pub start_delay: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(3),
            start_delay: Duration::from_secs(4),
        }
    }
}

/// Corrective action for an observed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Restart,
    Delete,
    Wait,
    Done,
}

impl Action {
    pub fn for_state(state: ProcessState) -> Self {
        match state {
            ProcessState::Online => Action::Done,
            ProcessState::NotFound | ProcessState::Unknown => Action::Start,
            ProcessState::Stopped | ProcessState::Stopping => Action::Restart,
            ProcessState::Errored => Action::Delete,
            ProcessState::Launching => Action::Wait,
        }
    }
}

/// Bounded retry loop over pm2 for one process
pub struct ProcessReconciler<'a> {
    pm2: &'a Pm2,
    start: StartSpec,
    options: ReconcileOptions,
}

impl<'a> ProcessReconciler<'a> {
    pub fn new(pm2: &'a Pm2, start: StartSpec, options: ReconcileOptions) -> Self {
        Self { pm2, start, options }
    }

    fn name(&self) -> &str {
        &self.start.name
    }

    async fn observe(&self) -> ProcessState {
        match self.pm2.status(self.name()).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not query pm2 for '{}': {}", self.name(), e);
                ProcessState::Unknown
            }
        }
    }

    /// Load the new code (restart if registered, start otherwise), then reconcile
    pub async fn deploy(&self) -> Result<(), DeployError> {
        match self.observe().await {
            ProcessState::NotFound | ProcessState::Unknown => self.pm2.start(&self.start).await?,
            _ => self.pm2.restart(self.name()).await?,
        }
        sleep(self.options.start_delay).await;
        self.ensure_running().await
    }

    /// Observe and correct until the process is online or attempts run out
    pub async fn ensure_running(&self) -> Result<(), DeployError> {
        for attempt in 1..=self.options.max_attempts {
            let state = self.observe().await;
            info!(
                "pm2 app '{}' is {} (attempt {}/{})",
                self.name(),
                state,
                attempt,
                self.options.max_attempts
            );

            let action = Action::for_state(state);
            if let Err(e) = self.apply(action, state).await {
                warn!("Corrective action for '{}' failed: {}", self.name(), e);
            }
            if action == Action::Done {
                return self.finish().await;
            }

            sleep(self.options.interval).await;
        }

        let state = self.observe().await;
        if state == ProcessState::Online {
            return self.finish().await;
        }
        Err(DeployError::ProcessNotRunning(state))
    }

    async fn apply(&self, action: Action, state: ProcessState) -> Result<(), DeployError> {
        match action {
            Action::Start => {
                if state == ProcessState::Unknown {
                    warn!("Treating unknown state of '{}' as not found", self.name());
                }
                self.pm2.start(&self.start).await
            }
            Action::Restart => self.pm2.restart(self.name()).await,
            Action::Delete => self.pm2.delete(self.name()).await,
            Action::Wait | Action::Done => Ok(()),
        }
    }

    async fn finish(&self) -> Result<(), DeployError> {
        info!("pm2 app '{}' is online", self.name());
        if let Err(e) = self.pm2.save().await {
            warn!("pm2 save failed: {}", e);
        }
        Ok(())
    }
}
