//! Registry and context resolution tests

use std::collections::HashMap;
use std::path::PathBuf;

use deploy_agent::models::context::{
    DeploymentContext, ENV_BRANCH, ENV_COMMIT, ENV_PUSHER, ENV_REPO_FULL_NAME, ENV_REPO_NAME,
    ENV_REPO_OWNER,
};
use deploy_agent::models::{ProjectShape, RepoConfig};
use deploy_agent::storage::registry::RepoRegistry;

#[test]
fn test_builtin_entries() {
    let registry = RepoRegistry::builtin();
    assert!(registry.contains("my-music-stats"));

    let config = registry.lookup("my-music-stats", "zoney");
    assert_eq!(config.shape, ProjectShape::ServiceTranspiled);
    assert!(config.combined);
    assert_eq!(config.web_root, PathBuf::from("/var/www/html/weeklies"));
    assert_eq!(config.process_descriptor.as_deref(), Some("ecosystem.config.js"));
}

#[test]
fn test_unknown_repo_falls_back_to_static_site() {
    let config = RepoRegistry::builtin().lookup("landing", "acme");

    assert_eq!(config.name, "landing");
    assert_eq!(config.shape, ProjectShape::Static);
    assert!(!config.combined);
    assert_eq!(config.repo_dir, PathBuf::from("/home/acme/landing"));
    assert_eq!(config.web_root, PathBuf::from("/var/www/html/landing"));
    assert_eq!(config.client_path(), PathBuf::from("/home/acme/landing/client"));
}

#[test]
fn test_with_entries_replaces_same_name() {
    let registry = RepoRegistry::builtin().with_entries([
        RepoConfig {
            name: "MEDHUB".to_string(),
            shape: ProjectShape::Containerized,
            domain: Some("med.example.com".to_string()),
            requires_migrations: true,
            ..Default::default()
        },
        RepoConfig {
            name: "shop".to_string(),
            repo_dir: PathBuf::from("/srv/shop"),
            ..Default::default()
        },
    ]);

    let medhub = registry.lookup("MEDHUB", "zoney");
    assert_eq!(medhub.shape, ProjectShape::Containerized);
    assert!(medhub.requires_migrations);
    assert_eq!(medhub.repo_dir, PathBuf::from("/home/zoney/MEDHUB"));

    let shop = registry.lookup("shop", "acme");
    assert_eq!(shop.repo_dir, PathBuf::from("/srv/shop"));
    assert_eq!(shop.web_root, PathBuf::from("/var/www/html/shop"));
    assert!(registry.names().contains(&"shop"));
}

#[test]
fn test_context_resolves_registry_entry() {
    let vars: HashMap<&str, &str> = HashMap::from([
        (ENV_REPO_NAME, "my-music-stats"),
        (ENV_BRANCH, "main"),
        (ENV_REPO_OWNER, "zoney"),
        (ENV_PUSHER, "zoney"),
        (ENV_COMMIT, "cafebabe1234"),
        (ENV_REPO_FULL_NAME, "zoney/my-music-stats"),
    ]);

    let ctx = DeploymentContext::from_lookup(
        |key| vars.get(key).map(|v| v.to_string()),
        &RepoRegistry::builtin(),
    )
    .unwrap();

    assert_eq!(ctx.config.name, "my-music-stats");
    assert_eq!(ctx.short_commit(), "cafebab");
    assert_eq!(ctx.config.server_path(), PathBuf::from("/home/zoney/my-music-stats/server"));
}
