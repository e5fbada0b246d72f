//! Reverse proxy and certificate provisioning

use std::sync::Arc;

use tracing::{info, warn};

use crate::models::RepoConfig;
use crate::tools::certbot::{Certbot, CertificateOutcome};
use crate::tools::nginx::{Nginx, Site, SiteKind};

/// Sets up nginx and TLS for a deployed site. Every step is best-effort.
pub struct Provisioner {
    nginx: Arc<Nginx>,
    certbot: Certbot,
}

impl Provisioner {
    pub fn new(nginx: Arc<Nginx>, certbot: Certbot) -> Self {
        Self { nginx, certbot }
    }

    /// Static files served from the web root. Needs a domain.
    pub async fn static_site(&self, config: &RepoConfig) {
        let Some(domain) = config.domain() else {
            return;
        };
        self.provision(Site {
            domain: domain.to_string(),
            aliases: config.domain_aliases.clone(),
            kind: SiteKind::Static {
                web_root: config.web_root.clone(),
            },
        })
        .await;
    }

    /// Reverse proxy to the service port. Needs a domain and a port.
    pub async fn reverse_proxy(&self, config: &RepoConfig) {
        let (Some(domain), Some(port)) = (config.domain(), config.port) else {
            return;
        };
        self.provision(Site {
            domain: domain.to_string(),
            aliases: config.domain_aliases.clone(),
            kind: SiteKind::ReverseProxy { port },
        })
        .await;
    }

    async fn provision(&self, site: Site) {
        info!("Provisioning {}", site.server_names());

        if let Err(e) = self.nginx.setup(&site).await {
            warn!("nginx setup for {} failed: {}", site.domain, e);
        }

        match self.certbot.request(&site.domain, &site.aliases).await {
            Ok(CertificateOutcome::RateLimited) => {
                warn!("Certificate for {} deferred by rate limit", site.domain)
            }
            Ok(_) => {}
            Err(e) => warn!("Certificate setup for {} failed: {}", site.domain, e),
        }
    }
}
