//! Let's Encrypt certificates through certbot

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::exec::{CommandRunner, CommandSpec};

const TOOL: &str = "certbot";

/// Markers certbot prints when the authority refuses for rate limiting
const RATE_LIMIT_MARKERS: &[&str] = &["too many certificates", "rateLimited"];

/// certbot paths and registration settings
#[derive(Debug, Clone)]
pub struct CertbotOptions {
    /// Directory holding `<domain>/fullchain.pem`
    pub live_dir: PathBuf,
    pub email: Option<String>,
    pub use_sudo: bool,
}

impl Default for CertbotOptions {
    fn default() -> Self {
        Self {
            live_dir: PathBuf::from("/etc/letsencrypt/live"),
            email: None,
            use_sudo: true,
        }
    }
}

/// Result of a certificate request.
///
/// `RateLimited` counts as success: the certificate is expected to arrive later
/// through the host's renewal cron.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateOutcome {
    AlreadyPresent,
    Issued,
    RateLimited,
}

/// certbot wrapper for one domain and its aliases
pub struct Certbot {
    options: CertbotOptions,
    runner: Arc<dyn CommandRunner>,
}

impl Certbot {
    pub fn new(options: CertbotOptions, runner: Arc<dyn CommandRunner>) -> Self {
        Self { options, runner }
    }

    fn command(&self) -> CommandSpec {
        if self.options.use_sudo {
            CommandSpec::new("sudo").arg("certbot")
        } else {
            CommandSpec::new("certbot")
        }
    }

    pub fn cert_path(&self, domain: &str) -> PathBuf {
        self.options.live_dir.join(domain).join("fullchain.pem")
    }

    pub async fn cert_exists(&self, domain: &str) -> bool {
        fs::metadata(self.cert_path(domain)).await.is_ok()
    }

    /// Build the request command line for a domain and its aliases
    pub fn request_command(&self, domain: &str, aliases: &[String]) -> CommandSpec {
        let mut spec = self
            .command()
            .args(["--nginx", "--non-interactive", "--agree-tos"]);

        spec = match self.options.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) => spec.args(["--email", email]),
            None => spec.arg("--register-unsafely-without-email"),
        };

        for name in std::iter::once(domain).chain(aliases.iter().map(String::as_str)) {
            spec = spec.args(["-d", name]);
        }
        spec
    }

    pub async fn request(&self, domain: &str, aliases: &[String]) -> Result<CertificateOutcome, DeployError> {
        if self.cert_exists(domain).await {
            info!("SSL certificate for {} already exists, skipping", domain);
            return Ok(CertificateOutcome::AlreadyPresent);
        }

        info!("Requesting SSL certificate for {}", domain);
        let spec = self.request_command(domain, aliases);
        let output = self.runner.output(&spec).await?;
        let combined = output.combined();

        if !output.success {
            if RATE_LIMIT_MARKERS.iter().any(|m| combined.contains(m)) {
                warn!("Let's Encrypt rate limit reached for {}, certificate will be requested later", domain);
                return Ok(CertificateOutcome::RateLimited);
            }
            return Err(DeployError::tool(TOOL, format!("`{}` failed", spec), combined));
        }

        info!("SSL certificate obtained: {}", self.cert_path(domain).display());
        Ok(CertificateOutcome::Issued)
    }

    /// Renew every certificate that is due
    pub async fn renew(&self) -> Result<(), DeployError> {
        info!("Renewing SSL certificates");
        let spec = self.command().args(["renew", "--nginx", "--non-interactive"]);
        let output = self.runner.output(&spec).await?;
        if !output.success {
            return Err(DeployError::tool(TOOL, format!("`{}` failed", spec), output.combined()));
        }
        info!("SSL certificates renewed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;

    fn options(dir: &std::path::Path, email: Option<&str>) -> CertbotOptions {
        CertbotOptions {
            live_dir: dir.to_path_buf(),
            email: email.map(str::to_string),
            use_sudo: true,
        }
    }

    #[test]
    fn test_request_command() {
        let certbot = Certbot::new(
            options(std::path::Path::new("/tmp/live"), Some("ops@example.com")),
            Arc::new(ScriptedRunner::succeeding()),
        );
        let spec = certbot.request_command("example.com", &["www.example.com".to_string()]);
        assert_eq!(
            spec.line(),
            "sudo certbot --nginx --non-interactive --agree-tos --email ops@example.com -d example.com -d www.example.com"
        );

        let anonymous = Certbot::new(
            options(std::path::Path::new("/tmp/live"), None),
            Arc::new(ScriptedRunner::succeeding()),
        );
        assert!(anonymous
            .request_command("example.com", &[])
            .line()
            .contains("--register-unsafely-without-email"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| {
            CommandOutput::failed(1, "Error: too many certificates already issued for example.com")
        }));
        let certbot = Certbot::new(options(dir.path(), None), runner);
        let outcome = certbot.request("example.com", &[]).await.unwrap();
        assert_eq!(outcome, CertificateOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_other_failures_surface() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| CommandOutput::failed(1, "DNS problem")));
        let certbot = Certbot::new(options(dir.path(), None), runner);
        let err = certbot.request("example.com", &[]).await.unwrap_err();
        assert!(err.to_string().contains("DNS problem"));
    }

    #[tokio::test]
    async fn test_existing_certificate_skips_request() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("example.com")).unwrap();
        std::fs::write(dir.path().join("example.com").join("fullchain.pem"), "cert").unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let certbot = Certbot::new(options(dir.path(), None), runner.clone());
        assert_eq!(
            certbot.request("example.com", &[]).await.unwrap(),
            CertificateOutcome::AlreadyPresent
        );
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_renew() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let certbot = Certbot::new(options(dir.path(), None), runner.clone());
        certbot.renew().await.unwrap();
        assert_eq!(runner.lines(), vec!["sudo certbot renew --nginx --non-interactive"]);
    }
}
