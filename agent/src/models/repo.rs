//! Per-repository deployment policy

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How a repository is built and served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectShape {
    /// Static assets copied into a web root
    #[default]
    #[serde(alias = "CLIENT")]
    Static,

    /// Service run from its sources, no compile step
    #[serde(alias = "API_JS")]
    ServiceUntranspiled,

    /// Service compiled into an output directory first
    #[serde(alias = "API_TS")]
    ServiceTranspiled,

    /// Service built and run through docker compose
    #[serde(alias = "DOCKER")]
    Containerized,
}

/// Static deployment policy for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub name: String,

    /// Local working copy
    pub repo_dir: PathBuf,

    /// Placement target for static assets
    pub web_root: PathBuf,

    pub shape: ProjectShape,

    /// Site plus service from the same repository
    pub combined: bool,

    pub client_dir: String,
    pub server_dir: String,

    /// Entry file hint for the service
    pub server_entry: String,

    /// pm2 ecosystem file, relative to the service directory
    pub process_descriptor: Option<String>,

    pub domain: Option<String>,
    pub domain_aliases: Vec<String>,
    pub port: Option<u16>,

    pub compose_file: Option<String>,
    pub env_file: Option<String>,

    pub requires_migrations: bool,
    pub migration_command: Option<String>,

    /// Compose service migrations run in
    pub migration_service: String,

    /// Absolute URL, or a path under the domain, probed after container deploys
    pub health_check_url: Option<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            repo_dir: PathBuf::new(),
            web_root: PathBuf::new(),
            shape: ProjectShape::Static,
            combined: false,
            client_dir: "client".to_string(),
            server_dir: "server".to_string(),
            server_entry: "app.js".to_string(),
            process_descriptor: None,
            domain: None,
            domain_aliases: Vec::new(),
            port: None,
            compose_file: None,
            env_file: None,
            requires_migrations: false,
            migration_command: None,
            migration_service: "api".to_string(),
            health_check_url: None,
        }
    }
}

fn subdir(root: &Path, dir: &str) -> PathBuf {
    match dir.trim() {
        "" | "." => root.to_path_buf(),
        dir => root.join(dir),
    }
}

impl RepoConfig {
    /// Directory the static site is built from
    pub fn client_path(&self) -> PathBuf {
        subdir(&self.repo_dir, &self.client_dir)
    }

    /// Directory the service (or compose project) lives in
    pub fn server_path(&self) -> PathBuf {
        subdir(&self.repo_dir, &self.server_dir)
    }

    /// Serving domain, if one is configured
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    /// Config for the service leg of a combined deployment: served from the
    /// `api.` subdomain with no aliases.
    pub fn server_leg(&self) -> RepoConfig {
        RepoConfig {
            domain: self.domain().map(|d| format!("api.{}", d)),
            domain_aliases: Vec::new(),
            ..self.clone()
        }
    }

    /// URL the HTTP health check targets after a container deploy
    pub fn health_check_target(&self) -> Option<String> {
        let target = self
            .health_check_url
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())?;
        if target.starts_with("http://") || target.starts_with("https://") {
            return Some(target.to_string());
        }
        let domain = self.domain()?;
        Some(format!("http://{}/{}", domain, target.trim_start_matches('/')))
    }
}
