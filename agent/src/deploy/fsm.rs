//! Finite State Machine for a deployment run

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::errors::DeployError;

/// Deployment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    /// Initial state, nothing done yet
    Starting,

    /// Fetching and comparing revisions
    Fetching,

    /// Pulling upstream changes
    Pulling,

    /// Building and placing the static site
    DeployingClient,

    /// Building and supervising the service
    DeployingServer,

    /// Combined site plus service deployment
    DeployingFullstack,

    /// Building container images
    BuildingDocker,

    /// Replacing running containers
    DeployingDocker,

    /// Running database migrations in a container
    RunningMigrations,

    /// Run finished successfully
    Success,

    /// Run failed
    Failed,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Starting => "STARTING",
            DeploymentState::Fetching => "FETCHING",
            DeploymentState::Pulling => "PULLING",
            DeploymentState::DeployingClient => "DEPLOYING_CLIENT",
            DeploymentState::DeployingServer => "DEPLOYING_SERVER",
            DeploymentState::DeployingFullstack => "DEPLOYING_FULLSTACK",
            DeploymentState::BuildingDocker => "BUILDING_DOCKER",
            DeploymentState::DeployingDocker => "DEPLOYING_DOCKER",
            DeploymentState::RunningMigrations => "RUNNING_MIGRATIONS",
            DeploymentState::Success => "SUCCESS",
            DeploymentState::Failed => "FAILED",
        }
    }

    /// Success and Failed accept no further events
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentState::Success | DeploymentState::Failed)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// Begin talking to the remote
    Fetch,

    /// Remote has commits the working copy lacks
    Pull,

    /// Local copy already matches the remote
    UpToDate,

    DeployClient,
    DeployServer,
    DeployFullstack,
    BuildDocker,
    DeployDocker,
    RunMigrations,

    /// Every stage completed
    Complete,

    /// A stage failed
    Fail(String),
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    error: Option<String>,
    history: Vec<DeploymentState>,
}

impl DeploymentFsm {
    /// Create a new FSM in the starting state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Starting,
            error: None,
            history: vec![DeploymentState::Starting],
        }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every state visited, in order, starting with `Starting`
    pub fn history(&self) -> &[DeploymentState] {
        &self.history
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<DeploymentState, DeployError> {
        use DeploymentEvent as E;
        use DeploymentState as S;

        let new_state = match (self.state, &event) {
            // Failed is reachable from any non-terminal state
            (state, E::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                S::Failed
            }

            (S::Starting, E::Fetch) => S::Fetching,

            (S::Fetching, E::Pull) => S::Pulling,
            (S::Fetching, E::UpToDate) => S::Success,

            (S::Pulling, E::DeployClient) => S::DeployingClient,
            (S::Pulling, E::DeployServer) => S::DeployingServer,
            (S::Pulling, E::DeployFullstack) => S::DeployingFullstack,
            (S::Pulling, E::BuildDocker) => S::BuildingDocker,

            // Combined deployments run the service leg, then the site leg
            (S::DeployingFullstack, E::DeployServer) => S::DeployingServer,
            (S::DeployingServer, E::DeployClient) => S::DeployingClient,

            (S::BuildingDocker, E::DeployDocker) => S::DeployingDocker,
            (S::DeployingDocker, E::RunMigrations) => S::RunningMigrations,

            (S::DeployingClient, E::Complete)
            | (S::DeployingServer, E::Complete)
            | (S::DeployingDocker, E::Complete)
            | (S::RunningMigrations, E::Complete) => S::Success,

            // Invalid transitions
            (state, event) => {
                return Err(DeployError::InvalidTransition(format!(
                    "{} -> {:?}",
                    state, event
                )));
            }
        };

        info!("State: {}", new_state);
        self.state = new_state;
        self.history.push(new_state);
        Ok(new_state)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsm_client_transitions() {
        let mut fsm = DeploymentFsm::new();
        assert_eq!(fsm.state(), DeploymentState::Starting);

        fsm.process(DeploymentEvent::Fetch).unwrap();
        fsm.process(DeploymentEvent::Pull).unwrap();
        fsm.process(DeploymentEvent::DeployClient).unwrap();
        fsm.process(DeploymentEvent::Complete).unwrap();

        assert_eq!(fsm.state(), DeploymentState::Success);
        assert_eq!(fsm.history().len(), 5);
    }

    #[test]
    fn test_fsm_error_handling() {
        let mut fsm = DeploymentFsm::new();

        fsm.process(DeploymentEvent::Fetch).unwrap();
        fsm.process(DeploymentEvent::Fail("test error".to_string()))
            .unwrap();

        assert_eq!(fsm.state(), DeploymentState::Failed);
        assert_eq!(fsm.error(), Some("test error"));

        let err = fsm.process(DeploymentEvent::Fetch).unwrap_err();
        assert!(matches!(err, DeployError::InvalidTransition(_)));
        assert!(fsm.process(DeploymentEvent::Fail("again".to_string())).is_err());
    }
}
