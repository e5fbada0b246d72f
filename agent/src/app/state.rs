//! Persisted record of a finished deployment run

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::deploy::{DeploymentState, RunOutcome};
use crate::errors::{DeployError, ErrorCategory};
use crate::filesys::file::File;
use crate::models::DeploymentContext;

/// Outcome as written to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Deployed,
    UpToDate,
    Failed,
}

/// Error details of a failed run
#[derive(Debug, Clone, Serialize)]
pub struct RecordError {
    pub category: ErrorCategory,
    pub message: String,
}

/// One JSON document per run, written when the run ends
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub deployment_id: String,
    pub repo: String,
    pub repo_full_name: String,
    pub branch: String,
    pub commit: String,
    pub pusher: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: DeploymentState,
    pub history: Vec<DeploymentState>,
    pub outcome: RecordOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordError>,
}

impl DeploymentRecord {
    pub fn new(
        ctx: &DeploymentContext,
        history: &[DeploymentState],
        result: &Result<RunOutcome, DeployError>,
    ) -> Self {
        let (outcome, error) = match result {
            Ok(RunOutcome::Deployed) => (RecordOutcome::Deployed, None),
            Ok(RunOutcome::UpToDate) => (RecordOutcome::UpToDate, None),
            Err(e) => (
                RecordOutcome::Failed,
                Some(RecordError {
                    category: e.category(),
                    message: e.to_string(),
                }),
            ),
        };

        Self {
            deployment_id: ctx.deployment_id.clone(),
            repo: ctx.repo_name.clone(),
            repo_full_name: ctx.repo_full_name.clone(),
            branch: ctx.branch.clone(),
            commit: ctx.commit.clone(),
            pusher: ctx.pusher.clone(),
            started_at: ctx.started_at,
            finished_at: Utc::now(),
            final_state: history.last().copied().unwrap_or(DeploymentState::Starting),
            history: history.to_vec(),
            outcome,
            error,
        }
    }

    pub async fn write(&self, file: &File) -> Result<(), DeployError> {
        file.write_json(self).await
    }
}
