//! Placement, backup and retention tests

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use deploy_agent::deploy::placement::PlacementManager;
use deploy_agent::errors::DeployError;
use deploy_agent::tools::nginx::ProxyReload;

#[derive(Default)]
struct RecordingReload {
    reloads: AtomicUsize,
}

#[async_trait]
impl ProxyReload for RecordingReload {
    async fn reload(&self) -> Result<(), DeployError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Host {
    _dir: tempfile::TempDir,
    root: PathBuf,
    reload: Arc<RecordingReload>,
}

impl Host {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        Self {
            _dir: dir,
            root,
            reload: Arc::new(RecordingReload::default()),
        }
    }

    fn manager(&self) -> PlacementManager {
        PlacementManager::new(self.root.join("backups"), self.reload.clone())
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.join(rel)).unwrap()
    }
}

fn entries(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_place_then_restore_round_trip() {
    let host = Host::new();
    host.write("www/site/index.html", "v1");
    host.write("www/site/assets/app.js", "console.log(1)");
    host.write("dist/index.html", "v2");

    let manager = host.manager();
    let target = host.root.join("www/site");
    let placement = manager.place(&host.root.join("dist"), &target).await.unwrap();

    assert_eq!(host.read("www/site/index.html"), "v2");
    assert!(!target.join("assets").exists());

    let backup = placement.backup.expect("non-empty target is backed up");
    assert_eq!(backup.target_basename, "site");
    assert!(backup.path.starts_with(host.root.join("backups")));

    assert_ok!(manager.restore(&backup, &target).await);
    assert_eq!(host.read("www/site/index.html"), "v1");
    assert_eq!(host.read("www/site/assets/app.js"), "console.log(1)");
    assert_eq!(host.reload.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_target_has_no_backup() {
    let host = Host::new();
    host.write("dist/index.html", "v1");

    let placement = host
        .manager()
        .place(&host.root.join("dist"), &host.root.join("www/fresh"))
        .await
        .unwrap();

    assert!(placement.backup.is_none());
    assert_eq!(host.read("www/fresh/index.html"), "v1");
    assert!(!host.root.join("backups").exists());
}

#[tokio::test]
async fn test_retention_keeps_newest_five() {
    let host = Host::new();
    let backups = host.root.join("backups");
    let stamps = [
        "20250101_000000_000001",
        "20250102_000000_000001",
        "20250103_000000_000001",
        "20250104_000000_000001",
        "20250105_000000_000001",
        "20250106_000000_000001",
        "20250107_000000_000001",
    ];
    for stamp in stamps {
        fs::create_dir_all(backups.join(format!("site_{}", stamp))).unwrap();
    }
    // Other targets and stray directories are left alone
    fs::create_dir_all(backups.join("other_20250101_000000_000001")).unwrap();
    fs::create_dir_all(backups.join("site_manual")).unwrap();

    let removed = host.manager().prune("site").await.unwrap();
    assert_eq!(removed, 2);

    let remaining = entries(&backups);
    assert!(!remaining.contains(&"site_20250101_000000_000001".to_string()));
    assert!(!remaining.contains(&"site_20250102_000000_000001".to_string()));
    assert!(remaining.contains(&"site_20250107_000000_000001".to_string()));
    assert!(remaining.contains(&"other_20250101_000000_000001".to_string()));
    assert!(remaining.contains(&"site_manual".to_string()));
    assert_eq!(host.manager().list_backups("site").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_repeated_placements_stay_within_retention() {
    let host = Host::new();
    host.write("dist/index.html", "next");
    let manager = host.manager().with_retention(2);
    let target = host.root.join("www/site");

    for round in 0..4 {
        host.write("www/site/index.html", &format!("round {}", round));
        manager.place(&host.root.join("dist"), &target).await.unwrap();
    }

    let backups = manager.list_backups("site").await.unwrap();
    assert_eq!(backups.len(), 2);
    assert_eq!(fs::read_to_string(backups[1].path.join("index.html")).unwrap(), "round 3");
}

#[tokio::test]
async fn test_six_placements_keep_newest_five_backups() {
    let host = Host::new();
    host.write("dist/index.html", "next");
    let manager = host.manager();
    let target = host.root.join("www/site");

    for round in 0..7 {
        host.write("www/site/index.html", &format!("round {}", round));
        manager.place(&host.root.join("dist"), &target).await.unwrap();
    }

    // Seven placements back up rounds 0 through 6; only 2 through 6 survive
    let backups = manager.list_backups("site").await.unwrap();
    assert_eq!(backups.len(), 5);
    let kept: Vec<String> = backups
        .iter()
        .map(|b| fs::read_to_string(b.path.join("index.html")).unwrap())
        .collect();
    assert_eq!(kept, vec!["round 2", "round 3", "round 4", "round 5", "round 6"]);
    assert_eq!(entries(&host.root.join("backups")).len(), 5);
    assert_eq!(host.read("www/site/index.html"), "next");
}

#[tokio::test]
async fn test_denied_target_is_untouched() {
    let host = Host::new();
    host.write("dist/index.html", "v2");
    let manager = host.manager();

    let targets = ["/", "/.", "/etc", "/etc/./", "/home/.", "/var/www/", "/var/www/html/..", ".", "  "];
    for target in targets {
        let err = assert_err!(manager.place(&host.root.join("dist"), Path::new(target)).await);
        assert!(matches!(err, DeployError::Precondition(_)), "{target}");
    }

    assert!(!host.root.join("backups").exists());
    assert_eq!(host.reload.reloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restore_missing_backup_fails() {
    let host = Host::new();
    host.write("www/site/index.html", "current");
    let manager = host.manager();

    let backup = deploy_agent::deploy::placement::Backup {
        path: host.root.join("backups/site_20250101_000000_000000"),
        target_basename: "site".to_string(),
        timestamp: "20250101_000000_000000".to_string(),
    };
    let err = manager.restore(&backup, &host.root.join("www/site")).await.unwrap_err();

    assert!(matches!(err, DeployError::Precondition(_)));
    assert_eq!(host.read("www/site/index.html"), "current");
}
