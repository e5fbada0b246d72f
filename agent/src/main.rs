//! Deploy Agent - Entry Point
//!
//! Runs one deployment for the repository named by the `GITHUB_*` environment
//! of a push trigger: sync, build, place, reconcile and verify.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use colored::Colorize;
use tracing::{error, info};

use deploy_agent::app::options::AppOptions;
use deploy_agent::app::run::{renew_certificates, run};
use deploy_agent::deploy::RunOutcome;
use deploy_agent::logs::init_logging;
use deploy_agent::models::DeploymentContext;
use deploy_agent::storage::settings::{Settings, SETTINGS_ENV};
use deploy_agent::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings_path = Settings::resolve_path(
        cli_args.get("settings").map(String::as_str),
        env::var(SETTINGS_ENV).ok(),
    );
    let settings = match Settings::load(&settings_path).await {
        Ok(settings) => settings.with_env_overrides(|key| env::var(key).ok()),
        Err(e) => {
            eprintln!("{} {}", "Unable to read settings:".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let options = AppOptions::from_settings(&settings);

    if cli_args.contains_key("renew-certs") {
        let _guard = init_logging(options.log_options(None)).ok().flatten();
        return match renew_certificates(&options).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Certificate renewal failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Resolve what this run deploys
    let registry = options.registry();
    let ctx = DeploymentContext::from_env(&registry);

    if cli_args.contains_key("print-config") {
        return match ctx.map(|ctx| serde_json::to_string_pretty(&ctx.config)) {
            Ok(Ok(json)) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Ok(Err(e)) => {
                eprintln!("Failed to serialize config: {e}");
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("{} {}", "Cannot resolve config:".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let ctx = match ctx {
        Ok(ctx) => ctx,
        Err(e) => {
            // no deployment id yet, so the agent log
            let _guard = match init_logging(options.log_options(None)) {
                Ok(guard) => guard,
                Err(log_err) => {
                    eprintln!("Failed to initialize logging: {log_err}");
                    None
                }
            };
            error!("Cannot start deployment: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_banner(&version.version, &ctx);

    // Initialize logging
    let guard = match init_logging(options.log_options(Some(&ctx.deployment_id))) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("Running deploy agent {} with options: {:?}", version.version, options);
    let code = match run(&options, ctx).await {
        Ok(RunOutcome::Deployed) => {
            info!("Deployment completed successfully");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::UpToDate) => {
            info!("Nothing to deploy");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Deployment failed ({:?}): {}", e.category(), e);
            ExitCode::FAILURE
        }
    };

    // Flush the log file before exiting
    drop(guard);
    code
}

fn print_banner(version: &str, ctx: &DeploymentContext) {
    println!("{}", format!("deploy-agent {}", version).bold().cyan());
    println!(
        "{} {} {} {} {}",
        ctx.repo_full_name.bold(),
        "@".dimmed(),
        ctx.branch.green(),
        ctx.short_commit().yellow(),
        format!("(pushed by {})", ctx.pusher).dimmed()
    );
}
