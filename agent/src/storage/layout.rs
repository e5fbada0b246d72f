//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Directories the agent writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// General agent logs
    pub log_dir: PathBuf,

    /// One record per finished deployment
    pub state_dir: PathBuf,

    /// Web root backups, owned by the placement manager
    pub backup_dir: PathBuf,

    /// One detailed log file per deployment
    pub verbose_log_dir: PathBuf,
}

impl StorageLayout {
    /// Layout with the log directories under `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            log_dir: home.join("logs"),
            state_dir: PathBuf::from("/var/tmp/deployment-states"),
            backup_dir: PathBuf::from("/var/tmp/deployment-backups"),
            verbose_log_dir: home.join("logs").join("deployments"),
        }
    }

    pub fn log_dir(&self) -> Dir {
        Dir::new(&self.log_dir)
    }

    pub fn state_dir(&self) -> Dir {
        Dir::new(&self.state_dir)
    }

    pub fn backup_dir(&self) -> Dir {
        Dir::new(&self.backup_dir)
    }

    pub fn verbose_log_dir(&self) -> Dir {
        Dir::new(&self.verbose_log_dir)
    }

    /// Get the record file for a deployment
    pub fn state_file(&self, deployment_id: &str) -> File {
        self.state_dir().file(&format!("deployment_{}.json", deployment_id))
    }

    /// Setup the storage layout (create directories, owner-only)
    pub async fn setup(&self) -> Result<(), DeployError> {
        self.log_dir().create_private().await?;
        self.state_dir().create_private().await?;
        self.backup_dir().create_private().await?;
        self.verbose_log_dir().create_private().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/root"));
        Self::with_home(home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_creates_private_dirs() {
        let root = tempfile::tempdir().unwrap();
        let layout = StorageLayout {
            log_dir: root.path().join("logs"),
            state_dir: root.path().join("states"),
            backup_dir: root.path().join("backups"),
            verbose_log_dir: root.path().join("logs/deployments"),
        };
        layout.setup().await.unwrap();

        assert!(layout.backup_dir().exists().await);
        assert!(layout.verbose_log_dir().exists().await);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&layout.state_dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_state_file_name() {
        let layout = StorageLayout::with_home("/home/ops");
        assert_eq!(
            layout.state_file("20250101_000000_7").path(),
            std::path::Path::new("/var/tmp/deployment-states/deployment_20250101_000000_7.json")
        );
        assert_eq!(layout.verbose_log_dir, PathBuf::from("/home/ops/logs/deployments"));
    }
}
