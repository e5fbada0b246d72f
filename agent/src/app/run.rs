//! Single deployment run

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::app::state::DeploymentRecord;
use crate::deploy::{DeploymentExecutor, RunOutcome};
use crate::errors::DeployError;
use crate::exec::{CommandRunner, SystemRunner};
use crate::http::{HttpProbe, ReqwestProbe};
use crate::models::DeploymentContext;
use crate::tools::certbot::Certbot;

/// Run one deployment against the real host tools
pub async fn run(options: &AppOptions, ctx: DeploymentContext) -> Result<RunOutcome, DeployError> {
    options.layout.setup().await?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let probe: Arc<dyn HttpProbe> = Arc::new(ReqwestProbe::new(options.http_timeout)?);
    run_with(options, ctx, runner, probe).await
}

/// Run one deployment and persist its record, whatever the outcome
pub async fn run_with(
    options: &AppOptions,
    ctx: DeploymentContext,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn HttpProbe>,
) -> Result<RunOutcome, DeployError> {
    let state_file = options.layout.state_file(&ctx.deployment_id);

    let mut executor = DeploymentExecutor::new(ctx, options.deploy.clone(), runner, probe);
    let result = executor.run().await;

    let record = DeploymentRecord::new(executor.context(), executor.history(), &result);
    match record.write(&state_file).await {
        Ok(()) => info!("Deployment record written to {}", state_file.path().display()),
        Err(e) => warn!("Failed to write deployment record: {}", e),
    }

    result
}

/// Renew due certificates outside of a deployment
pub async fn renew_certificates(options: &AppOptions) -> Result<(), DeployError> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    Certbot::new(options.deploy.certbot.clone(), runner).renew().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;
    use crate::http::testing::ScriptedProbe;
    use crate::models::RepoConfig;
    use crate::storage::layout::StorageLayout;
    use chrono::Utc;

    fn setup(root: &std::path::Path) -> (AppOptions, DeploymentContext) {
        std::fs::create_dir_all(root.join("repo/.git")).unwrap();
        let options = AppOptions {
            layout: StorageLayout {
                log_dir: root.join("logs"),
                state_dir: root.join("states"),
                backup_dir: root.join("backups"),
                verbose_log_dir: root.join("logs/deployments"),
            },
            ..Default::default()
        };
        let ctx = DeploymentContext {
            repo_name: "site".to_string(),
            branch: "main".to_string(),
            repo_owner: "acme".to_string(),
            pusher: "octocat".to_string(),
            commit: "aaaaaaa".to_string(),
            repo_full_name: "acme/site".to_string(),
            deployment_id: "20250101_000000_9".to_string(),
            started_at: Utc::now(),
            config: RepoConfig {
                name: "site".to_string(),
                repo_dir: root.join("repo"),
                web_root: root.join("www/site"),
                ..Default::default()
            },
        };
        (options, ctx)
    }

    #[tokio::test]
    async fn test_up_to_date_run_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let (options, ctx) = setup(dir.path());
        let runner = Arc::new(ScriptedRunner::new(|spec| match spec.line().as_str() {
            "git rev-parse @" | "git rev-parse origin/main" => CommandOutput::ok("aaaaaaa\n"),
            _ => CommandOutput::ok(""),
        }));

        let outcome = run_with(&options, ctx, runner, Arc::new(ScriptedProbe::new(200)))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::UpToDate);

        let record: serde_json::Value = options
            .layout
            .state_file("20250101_000000_9")
            .read_json()
            .await
            .unwrap();
        assert_eq!(record["outcome"], "up_to_date");
        assert_eq!(record["final_state"], "SUCCESS");
    }

    #[tokio::test]
    async fn test_failed_run_still_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let (options, ctx) = setup(dir.path());
        let runner = Arc::new(ScriptedRunner::new(|spec| {
            if spec.args.first().map(String::as_str) == Some("fetch") {
                CommandOutput::failed(128, "could not resolve host")
            } else {
                CommandOutput::ok("")
            }
        }));

        let result = run_with(&options, ctx, runner, Arc::new(ScriptedProbe::new(200))).await;
        assert!(result.is_err());

        let record: serde_json::Value = options
            .layout
            .state_file("20250101_000000_9")
            .read_json()
            .await
            .unwrap();
        assert_eq!(record["outcome"], "failed");
        assert_eq!(record["error"]["category"], "external_tool");
        assert_eq!(record["final_state"], "FAILED");
    }
}
