//! nginx site configuration

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::exec::{run_checked, CommandRunner, CommandSpec};

const TOOL: &str = "nginx";

/// nginx paths and privilege settings
#[derive(Debug, Clone)]
pub struct NginxOptions {
    pub sites_available: PathBuf,
    pub sites_enabled: PathBuf,
    /// Prefix privileged commands with sudo
    pub use_sudo: bool,
}

impl Default for NginxOptions {
    fn default() -> Self {
        Self {
            sites_available: PathBuf::from("/etc/nginx/sites-available"),
            sites_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
            use_sudo: true,
        }
    }
}

/// What a site serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    /// Static files from a web root
    Static { web_root: PathBuf },

    /// Reverse proxy to a local port
    ReverseProxy { port: u16 },
}

/// One virtual host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub domain: String,
    pub aliases: Vec<String>,
    pub kind: SiteKind,
}

impl Site {
    pub fn server_names(&self) -> String {
        std::iter::once(self.domain.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render the server block for this site
    pub fn render(&self) -> String {
        let names = self.server_names();
        match &self.kind {
            SiteKind::Static { web_root } => format!(
                r#"server {{
    listen 80;
    listen [::]:80;
    server_name {names};

    root {root};
    index index.html;

    location / {{
        try_files $uri $uri/ /index.html;
    }}

    location ~* \.(js|css|png|jpg|jpeg|gif|svg|ico|woff2?)$ {{
        expires 30d;
        add_header Cache-Control "public, immutable";
    }}
}}
"#,
                names = names,
                root = web_root.display(),
            ),
            SiteKind::ReverseProxy { port } => format!(
                r#"server {{
    listen 80;
    listen [::]:80;
    server_name {names};

    location / {{
        proxy_pass http://localhost:{port};
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection 'upgrade';
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_cache_bypass $http_upgrade;
    }}
}}
"#,
                names = names,
                port = port,
            ),
        }
    }
}

/// Reloads the reverse proxy after files it serves have changed
#[async_trait]
pub trait ProxyReload: Send + Sync {
    async fn reload(&self) -> Result<(), DeployError>;
}

/// nginx wrapper
pub struct Nginx {
    options: NginxOptions,
    runner: Arc<dyn CommandRunner>,
}

impl Nginx {
    pub fn new(options: NginxOptions, runner: Arc<dyn CommandRunner>) -> Self {
        Self { options, runner }
    }

    fn privileged(&self, program: &str) -> CommandSpec {
        if self.options.use_sudo {
            CommandSpec::new("sudo").arg(program)
        } else {
            CommandSpec::new(program)
        }
    }

    pub fn config_path(&self, domain: &str) -> PathBuf {
        self.options.sites_available.join(domain)
    }

    pub async fn config_exists(&self, domain: &str) -> bool {
        fs::metadata(self.config_path(domain)).await.is_ok()
    }

    /// Write the site config unless one already exists
    pub async fn generate_config(&self, site: &Site) -> Result<(), DeployError> {
        if self.config_exists(&site.domain).await {
            info!("nginx config for {} already exists, skipping generation", site.domain);
            return Ok(());
        }

        let path = self.config_path(&site.domain);
        let spec = self
            .privileged("tee")
            .arg(path.display().to_string())
            .stdin(site.render());
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;

        info!("nginx config created: {}", path.display());
        Ok(())
    }

    pub async fn enable_site(&self, domain: &str) -> Result<(), DeployError> {
        let target = self.options.sites_enabled.join(domain);
        if fs::symlink_metadata(&target).await.is_ok() {
            debug!("Site {} already enabled", domain);
            return Ok(());
        }

        let spec = self.privileged("ln").args([
            "-s".to_string(),
            self.config_path(domain).display().to_string(),
            target.display().to_string(),
        ]);
        run_checked(self.runner.as_ref(), TOOL, &spec).await?;

        info!("Site {} enabled", domain);
        Ok(())
    }

    pub async fn test_config(&self) -> Result<(), DeployError> {
        run_checked(self.runner.as_ref(), TOOL, &self.privileged("nginx").arg("-t")).await?;
        debug!("nginx configuration is valid");
        Ok(())
    }

    /// Generate, enable, validate and reload
    pub async fn setup(&self, site: &Site) -> Result<(), DeployError> {
        self.generate_config(site).await?;
        self.enable_site(&site.domain).await?;
        self.test_config().await?;
        self.reload().await
    }
}

#[async_trait]
impl ProxyReload for Nginx {
    async fn reload(&self) -> Result<(), DeployError> {
        let attempts = [
            self.privileged("systemctl").args(["reload", "nginx"]),
            self.privileged("service").args(["nginx", "reload"]),
        ];

        let mut last_error = None;
        for spec in attempts.iter() {
            match run_checked(self.runner.as_ref(), TOOL, spec).await {
                Ok(_) => {
                    info!("nginx reloaded");
                    return Ok(());
                }
                Err(e) => {
                    warn!("`{}` failed", spec);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DeployError::Internal("no reload command".to_string())))
    }
}
