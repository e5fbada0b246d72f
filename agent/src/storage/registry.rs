//! Repository deployment registry

use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::repo::{ProjectShape, RepoConfig};

/// Deployment policy keyed by repository name
#[derive(Debug, Clone, Default)]
pub struct RepoRegistry {
    entries: HashMap<String, RepoConfig>,
}

impl RepoRegistry {
    /// An empty registry, every lookup falls back to the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the repositories this host is known to serve
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.insert(RepoConfig {
            name: "zoneyhub".to_string(),
            repo_dir: PathBuf::from("/home/zoney/zoneyhub"),
            web_root: PathBuf::from("/var/www/html/zoneyhub"),
            shape: ProjectShape::Static,
            ..Default::default()
        });
        registry.insert(RepoConfig {
            name: "my-music-stats".to_string(),
            repo_dir: PathBuf::from("/home/zoney/my-music-stats"),
            web_root: PathBuf::from("/var/www/html/weeklies"),
            shape: ProjectShape::ServiceTranspiled,
            combined: true,
            server_entry: "main.js".to_string(),
            process_descriptor: Some("ecosystem.config.js".to_string()),
            ..Default::default()
        });
        registry.insert(RepoConfig {
            name: "URL-Shortener-App".to_string(),
            repo_dir: PathBuf::from("/home/zoney/URL-Shortener-App"),
            web_root: PathBuf::from("/var/www/html/URL-Shortener-App"),
            shape: ProjectShape::ServiceUntranspiled,
            ..Default::default()
        });
        registry.insert(RepoConfig {
            name: "MEDHUB".to_string(),
            repo_dir: PathBuf::from("/home/zoney/MEDHUB"),
            web_root: PathBuf::from("/var/www/html/MEDHUB"),
            shape: ProjectShape::ServiceTranspiled,
            ..Default::default()
        });

        registry
    }

    /// Add or replace an entry
    pub fn insert(&mut self, config: RepoConfig) {
        self.entries.insert(config.name.clone(), config);
    }

    /// Layer entries on top, replacing same-named ones
    pub fn with_entries(mut self, configs: impl IntoIterator<Item = RepoConfig>) -> Self {
        for config in configs {
            self.insert(config);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Policy for a repository. Unknown repositories get a static site deployed
    /// from `/home/<owner>/<name>` into `/var/www/html/<name>`.
    pub fn lookup(&self, name: &str, owner: &str) -> RepoConfig {
        let mut config = self.entries.get(name).cloned().unwrap_or_else(|| RepoConfig {
            shape: ProjectShape::Static,
            combined: false,
            ..Default::default()
        });

        config.name = name.to_string();
        if config.repo_dir.as_os_str().is_empty() {
            config.repo_dir = PathBuf::from("/home").join(owner).join(name);
        }
        if config.web_root.as_os_str().is_empty() {
            config.web_root = PathBuf::from("/var/www/html").join(name);
        }
        config
    }
}
