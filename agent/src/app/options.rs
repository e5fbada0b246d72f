//! Application configuration options

use std::time::Duration;

use crate::deploy::DeployOptions;
use crate::logs::{deployment_log_file, LogLevel, LogOptions, AGENT_LOG_FILE};
use crate::models::RepoConfig;
use crate::storage::layout::StorageLayout;
use crate::storage::registry::RepoRegistry;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub log_level: LogLevel,

    /// JSON formatted stdout logs
    pub json_logs: bool,

    /// Storage configuration
    pub layout: StorageLayout,

    /// Deployment stage options
    pub deploy: DeployOptions,

    /// Per-request timeout of HTTP health checks
    pub http_timeout: Duration,

    /// Repository entries layered over the built-in registry
    pub repos: Vec<RepoConfig>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            layout: StorageLayout::default(),
            deploy: DeployOptions::default(),
            http_timeout: Duration::from_secs(10),
            repos: Vec::new(),
        }
    }
}

impl AppOptions {
    /// Resolve settings over the built-in defaults
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();

        let mut layout = defaults.layout;
        let storage = &settings.storage;
        if let Some(dir) = &storage.log_dir {
            layout.log_dir = dir.clone();
        }
        if let Some(dir) = &storage.state_dir {
            layout.state_dir = dir.clone();
        }
        if let Some(dir) = &storage.backup_dir {
            layout.backup_dir = dir.clone();
        }
        if let Some(dir) = &storage.verbose_log_dir {
            layout.verbose_log_dir = dir.clone();
        }

        let timings = &settings.timings;
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };

        let mut deploy = defaults.deploy;
        deploy.backup_root = layout.backup_dir.clone();
        deploy.backup_retention = settings.backup_retention.max(1);

        deploy.build.output_wait_timeout =
            secs(timings.build_output_timeout_secs, deploy.build.output_wait_timeout);
        deploy.build.output_poll_interval =
            secs(timings.build_poll_interval_secs, deploy.build.output_poll_interval);
        deploy.build.settle_delay = secs(timings.build_settle_secs, deploy.build.settle_delay);

        deploy.reconcile.max_attempts = timings
            .reconcile_attempts
            .unwrap_or(deploy.reconcile.max_attempts)
            .max(1);
        deploy.reconcile.interval = secs(timings.reconcile_interval_secs, deploy.reconcile.interval);
        deploy.reconcile.start_delay =
            secs(timings.reconcile_start_delay_secs, deploy.reconcile.start_delay);

        deploy.health.attempts = timings.health_attempts.unwrap_or(deploy.health.attempts).max(1);
        deploy.health.delay = secs(timings.health_delay_secs, deploy.health.delay);

        deploy.compose.settle_delay = secs(timings.compose_settle_secs, deploy.compose.settle_delay);

        deploy.nginx.sites_available = settings.nginx.sites_available.clone();
        deploy.nginx.sites_enabled = settings.nginx.sites_enabled.clone();
        deploy.nginx.use_sudo = settings.use_sudo;

        deploy.certbot.live_dir = settings.certbot.live_dir.clone();
        deploy.certbot.email = settings.ssl_email.clone();
        deploy.certbot.use_sudo = settings.use_sudo;

        Self {
            log_level: settings.log_level,
            json_logs: settings.json_logs,
            layout,
            deploy,
            http_timeout: secs(timings.http_timeout_secs, defaults.http_timeout),
            repos: settings.repos.clone(),
        }
    }

    /// Built-in repositories with the configured ones on top
    pub fn registry(&self) -> RepoRegistry {
        RepoRegistry::builtin().with_entries(self.repos.iter().cloned())
    }

    /// Logging setup. A deployment run gets its own file in the verbose log dir,
    /// anything else appends to the agent log.
    pub fn log_options(&self, deployment_id: Option<&str>) -> LogOptions {
        let (log_dir, file_name) = match deployment_id {
            Some(id) => (self.layout.verbose_log_dir.clone(), deployment_log_file(id)),
            None => (self.layout.log_dir.clone(), AGENT_LOG_FILE.to_string()),
        };
        LogOptions {
            log_level: self.log_level,
            stdout: true,
            log_dir,
            file_name: Some(file_name),
            json_format: self.json_logs,
        }
    }
}
