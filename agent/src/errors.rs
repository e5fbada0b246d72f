//! Error types for the deploy agent

use serde::Serialize;
use thiserror::Error;

use crate::tools::pm2::ProcessState;

/// Coarse error taxonomy used for reporting and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Refused before doing anything (dangerous path, missing environment value)
    Precondition,

    /// An external binary exited non-zero
    ExternalTool,

    /// A bounded wait ran out
    Timeout,

    /// Rollback itself failed, host state is ambiguous
    StateInconsistency,

    /// Any other stage failure
    Failure,
}

/// Main error type for the deploy agent
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{tool} failed: {message}\nOutput: {output}")]
    ExternalTool {
        tool: String,
        message: String,
        output: String,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not a git repository: {0}")]
    NotARepository(String),

    #[error("No '{script}' script found in {manifest}")]
    MissingScript { script: String, manifest: String },

    #[error("No build output directory found in {0}")]
    NoBuildOutput(String),

    #[error("Build completed but no entry file found in {0}")]
    NoEntryPoint(String),

    #[error("Process not running after reconciliation (last state: {0})")]
    ProcessNotRunning(ProcessState),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Deployment failed, previous release restored: {original}")]
    RolledBack { original: Box<DeployError> },

    #[error("Deployment failed and rollback failed: {original}; rollback error: {rollback}")]
    StateInconsistency {
        original: Box<DeployError>,
        rollback: Box<DeployError>,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Build an external tool error from a command's captured output
    pub fn tool(tool: impl Into<String>, message: impl Into<String>, output: impl Into<String>) -> Self {
        DeployError::ExternalTool {
            tool: tool.into(),
            message: message.into(),
            output: output.into(),
        }
    }

    /// Map the error onto the reporting taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::Precondition(_) | DeployError::ConfigError(_) => ErrorCategory::Precondition,
            DeployError::ExternalTool { .. } => ErrorCategory::ExternalTool,
            DeployError::Timeout(_) => ErrorCategory::Timeout,
            DeployError::StateInconsistency { .. } => ErrorCategory::StateInconsistency,
            DeployError::RolledBack { original } => original.category(),
            _ => ErrorCategory::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolled_back_keeps_original_category() {
        let err = DeployError::RolledBack {
            original: Box::new(DeployError::HealthCheckFailed("status 500".to_string())),
        };
        assert_eq!(err.category(), ErrorCategory::Failure);
        assert!(err.to_string().contains("status 500"));
    }

    #[test]
    fn test_state_inconsistency_names_both_causes() {
        let err = DeployError::StateInconsistency {
            original: Box::new(DeployError::HealthCheckFailed("status 500".to_string())),
            rollback: Box::new(DeployError::Precondition("backup missing".to_string())),
        };
        let message = err.to_string();
        assert!(message.contains("status 500"));
        assert!(message.contains("backup missing"));
        assert_eq!(err.category(), ErrorCategory::StateInconsistency);
    }
}
