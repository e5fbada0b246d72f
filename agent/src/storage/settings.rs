//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::RepoConfig;

/// Settings path used when neither the CLI nor the environment names one
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/deploy-agent/settings.json";

/// Environment variable naming the settings file
pub const SETTINGS_ENV: &str = "DEPLOY_AGENT_SETTINGS";

/// Environment variable overriding the certificate registration email
pub const SSL_EMAIL_ENV: &str = "SSL_EMAIL";

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// JSON formatted stdout logs
    #[serde(default)]
    pub json_logs: bool,

    /// Storage directories, unset fields keep their defaults
    #[serde(default)]
    pub storage: StorageSettings,

    /// Email registered with Let's Encrypt
    #[serde(default)]
    pub ssl_email: Option<String>,

    /// Prefix nginx and certbot commands with sudo
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    #[serde(default)]
    pub nginx: NginxSettings,

    #[serde(default)]
    pub certbot: CertbotSettings,

    /// Retry bounds and delays
    #[serde(default)]
    pub timings: TimingSettings,

    /// Backups kept per web root
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,

    /// Repositories added to, or replacing, the built-in registry entries
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

fn default_true() -> bool {
    true
}

fn default_backup_retention() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            storage: StorageSettings::default(),
            ssl_email: None,
            use_sudo: true,
            nginx: NginxSettings::default(),
            certbot: CertbotSettings::default(),
            timings: TimingSettings::default(),
            backup_retention: default_backup_retention(),
            repos: Vec::new(),
        }
    }
}

impl Settings {
    /// Read the settings file, falling back to defaults when it does not exist
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        let file = File::new(path);
        if !file.exists().await {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        file.read_json().await.map_err(|e| {
            DeployError::ConfigError(format!("invalid settings file {}: {}", path.display(), e))
        })
    }

    /// `--settings=` wins over the environment, then the default path
    pub fn resolve_path(cli: Option<&str>, env: Option<String>) -> PathBuf {
        cli.map(str::to_string)
            .or(env)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH))
    }

    /// Apply `SSL_EMAIL` when it is set
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(email) = lookup(SSL_EMAIL_ENV).filter(|e| !e.trim().is_empty()) {
            self.ssl_email = Some(email.trim().to_string());
        }
        self
    }
}

/// Storage directory overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub verbose_log_dir: Option<PathBuf>,
}

/// nginx directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxSettings {
    #[serde(default = "default_sites_available")]
    pub sites_available: PathBuf,

    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: PathBuf,
}

fn default_sites_available() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-available")
}

fn default_sites_enabled() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-enabled")
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            sites_available: default_sites_available(),
            sites_enabled: default_sites_enabled(),
        }
    }
}

/// certbot directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertbotSettings {
    #[serde(default = "default_live_dir")]
    pub live_dir: PathBuf,
}

fn default_live_dir() -> PathBuf {
    PathBuf::from("/etc/letsencrypt/live")
}

impl Default for CertbotSettings {
    fn default() -> Self {
        Self {
            live_dir: default_live_dir(),
        }
    }
}

/// Timing overrides, unset fields keep the built-in values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default)]
    pub build_output_timeout_secs: Option<u64>,
    #[serde(default)]
    pub build_poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub build_settle_secs: Option<u64>,
    #[serde(default)]
    pub reconcile_attempts: Option<u32>,
    #[serde(default)]
    pub reconcile_interval_secs: Option<u64>,
    #[serde(default)]
    pub reconcile_start_delay_secs: Option<u64>,
    #[serde(default)]
    pub health_attempts: Option<u32>,
    #[serde(default)]
    pub health_delay_secs: Option<u64>,
    #[serde(default)]
    pub compose_settle_secs: Option<u64>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}
