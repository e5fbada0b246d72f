//! Web root placement with backup, restore and retention

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::filesys::Dir;
use crate::tools::nginx::ProxyReload;
use crate::utils::{backup_timestamp, is_backup_timestamp};

/// Paths a deployment must never clear
const DENIED_TARGETS: &[&str] = &[
    "/home", "/root", "/etc", "/usr", "/var", "/var/www", "/bin", "/boot", "/opt", "/tmp",
];

pub const DEFAULT_RETENTION: usize = 5;

/// Copy of a target's previous contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    pub target_basename: String,
    pub timestamp: String,
}

/// What a placement left behind for rollback
#[derive(Debug, Clone, Default)]
pub struct Placement {
    /// `None` when the target was empty or the backup failed
    pub backup: Option<Backup>,
}

/// Owns the backup root and every write to placement targets
pub struct PlacementManager {
    backup_root: PathBuf,
    retention: usize,
    proxy: Arc<dyn ProxyReload>,
}

impl PlacementManager {
    pub fn new(backup_root: impl Into<PathBuf>, proxy: Arc<dyn ProxyReload>) -> Self {
        Self {
            backup_root: backup_root.into(),
            retention: DEFAULT_RETENTION,
            proxy,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Refuse relative paths, `..` segments, the root and system directories.
    /// `.` segments and trailing slashes do not change what is compared.
    pub fn guard_target(target: &Path) -> Result<(), DeployError> {
        let refuse = |reason: &str| {
            DeployError::Precondition(format!(
                "refusing to deploy into {} '{}'",
                reason,
                target.display()
            ))
        };

        if !target.is_absolute() {
            return Err(refuse("relative path"));
        }

        let mut normalized = PathBuf::new();
        for component in target.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => return Err(refuse("path with '..'")),
                other => normalized.push(other),
            }
        }

        if normalized.parent().is_none() {
            return Err(refuse("root directory"));
        }
        if DENIED_TARGETS.iter().any(|denied| normalized == Path::new(denied)) {
            return Err(refuse("system directory"));
        }
        Ok(())
    }

    /// Copy the target's current contents into a fresh backup. `None` if there is nothing to keep.
    pub async fn backup(&self, target: &Path) -> Result<Option<Backup>, DeployError> {
        Self::guard_target(target)?;
        let target_dir = Dir::new(target);
        if target_dir.is_empty().await? {
            debug!("{} is empty, nothing to back up", target.display());
            return Ok(None);
        }

        let basename = target_dir.basename();
        let timestamp = self.free_timestamp(&basename).await;
        let path = self.backup_root.join(format!("{}_{}", basename, timestamp));

        info!("Backing up {} to {}", target.display(), path.display());
        let root = Dir::new(&self.backup_root);
        root.create().await?;

        // Only complete copies get a timestamped name
        let staging = root.staging_subdir();
        if let Err(e) = target_dir.copy_contents_to(staging.path()).await {
            if let Err(cleanup) = staging.delete().await {
                warn!("Failed to remove partial backup {}: {}", staging.path().display(), cleanup);
            }
            return Err(e);
        }
        staging.rename_to(&path).await?;

        let backup = Backup {
            path,
            target_basename: basename.clone(),
            timestamp,
        };

        if let Err(e) = self.prune(&basename).await {
            warn!("Failed to prune old backups of {}: {}", basename, e);
        }
        Ok(Some(backup))
    }

    async fn free_timestamp(&self, basename: &str) -> String {
        let base = backup_timestamp(Utc::now());
        let mut candidate = base.clone();
        let mut suffix = 1;
        while Dir::new(self.backup_root.join(format!("{}_{}", basename, candidate)))
            .exists()
            .await
        {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    /// Remove everything in the target, creating it if absent
    pub async fn clear(&self, target: &Path) -> Result<(), DeployError> {
        Self::guard_target(target)?;
        Dir::new(target).clear().await
    }

    /// Back up the target, then replace its contents with the artifact's.
    /// A failed backup only costs the rollback; clear and copy failures are fatal.
    pub async fn place(&self, artifact: &Path, target: &Path) -> Result<Placement, DeployError> {
        Self::guard_target(target)?;

        let backup = match self.backup(target).await {
            Ok(backup) => backup,
            Err(e) => {
                warn!("Backup of {} failed, no rollback available: {}", target.display(), e);
                None
            }
        };

        self.clear(target).await?;
        Dir::new(artifact).copy_contents_to(target).await?;
        info!("Placed {} into {}", artifact.display(), target.display());

        Ok(Placement { backup })
    }

    /// Put a backup's contents back into the target and reload the proxy
    pub async fn restore(&self, backup: &Backup, target: &Path) -> Result<(), DeployError> {
        Self::guard_target(target)?;
        let source = Dir::new(&backup.path);
        if !source.exists().await {
            return Err(DeployError::Precondition(format!(
                "backup {} does not exist",
                backup.path.display()
            )));
        }

        info!("Restoring {} from {}", target.display(), backup.path.display());
        self.clear(target).await?;
        source.copy_contents_to(target).await?;

        if let Err(e) = self.proxy.reload().await {
            warn!("Proxy reload after restore failed: {}", e);
        }
        Ok(())
    }

    /// Backups of one target, oldest first
    pub async fn list_backups(&self, basename: &str) -> Result<Vec<Backup>, DeployError> {
        let root = Dir::new(&self.backup_root);
        if !root.exists().await {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_", basename);
        let mut backups: Vec<Backup> = root
            .list_dirs()
            .await?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let timestamp = name.strip_prefix(&prefix)?;
                is_backup_timestamp(timestamp).then(|| Backup {
                    target_basename: basename.to_string(),
                    timestamp: timestamp.to_string(),
                    path: path.clone(),
                })
            })
            .collect();

        backups.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(backups)
    }

    /// Keep only the newest backups of one target
    pub async fn prune(&self, basename: &str) -> Result<usize, DeployError> {
        let backups = self.list_backups(basename).await?;
        let excess = backups.len().saturating_sub(self.retention);

        for backup in &backups[..excess] {
            debug!("Removing old backup {}", backup.path.display());
            Dir::new(&backup.path).delete().await?;
        }
        if excess > 0 {
            info!("Pruned {} old backup(s) of {}", excess, basename);
        }
        Ok(excess)
    }
}
