//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::DeployError;

/// A directory wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last path component, used to name backups
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), DeployError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Create the directory (and parents) readable only by the owner
    pub async fn create_private(&self) -> Result<(), DeployError> {
        self.create().await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), DeployError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Direct children of the directory
    pub async fn entries(&self) -> Result<Vec<PathBuf>, DeployError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }

        Ok(paths)
    }

    /// A missing directory counts as empty
    pub async fn is_empty(&self) -> Result<bool, DeployError> {
        match fs::read_dir(&self.path).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// List subdirectories
    pub async fn list_dirs(&self) -> Result<Vec<PathBuf>, DeployError> {
        let mut dirs = Vec::new();
        for path in self.entries().await? {
            if fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    /// Remove every entry, creating the directory if it is absent
    pub async fn clear(&self) -> Result<(), DeployError> {
        self.create().await?;
        for path in self.entries().await? {
            let meta = fs::symlink_metadata(&path).await?;
            if meta.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    /// Recursively copy this directory's contents into `dest`, creating it if needed.
    /// Symlinks are recreated, not followed.
    pub async fn copy_contents_to(&self, dest: &Path) -> Result<(), DeployError> {
        let mut pending = vec![(self.path.clone(), dest.to_path_buf())];

        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst).await?;
            let mut entries = fs::read_dir(&src).await?;

            while let Some(entry) = entries.next_entry().await? {
                let from = entry.path();
                let to = dst.join(entry.file_name());
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push((from, to));
                } else if file_type.is_symlink() {
                    copy_symlink(&from, &to).await?;
                } else {
                    fs::copy(&from, &to).await?;
                }
            }
        }

        Ok(())
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> crate::filesys::file::File {
        crate::filesys::file::File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Uniquely named hidden subdirectory, not created yet
    pub fn staging_subdir(&self) -> Dir {
        self.subdir(&format!(".staging-{}", uuid::Uuid::new_v4()))
    }

    /// Move this directory to `dest`, which must not exist
    pub async fn rename_to(&self, dest: &Path) -> Result<Dir, DeployError> {
        fs::rename(&self.path, dest).await?;
        Ok(Dir::new(dest))
    }
}

#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> Result<(), DeployError> {
    let target = fs::read_link(from).await?;
    fs::symlink(target, to).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, to: &Path) -> Result<(), DeployError> {
    fs::copy(from, to).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_and_clear() {
        let root = tempfile::tempdir().unwrap();
        let src = Dir::new(root.path().join("src"));
        std::fs::create_dir_all(src.path().join("assets/img")).unwrap();
        std::fs::write(src.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(src.path().join("assets/img/logo.svg"), "<svg/>").unwrap();

        let dest = Dir::new(root.path().join("dest"));
        src.copy_contents_to(dest.path()).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.path().join("assets/img/logo.svg")).unwrap(),
            "<svg/>"
        );

        dest.clear().await.unwrap();
        assert!(dest.exists().await);
        assert!(dest.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_staging_rename() {
        let root = tempfile::tempdir().unwrap();
        let parent = Dir::new(root.path());
        let staging = parent.staging_subdir();
        assert!(staging.basename().starts_with(".staging-"));
        assert_ne!(staging.path(), parent.staging_subdir().path());

        staging.create().await.unwrap();
        std::fs::write(staging.path().join("a.txt"), "a").unwrap();
        let done = staging.rename_to(&root.path().join("final")).await.unwrap();
        assert!(!staging.exists().await);
        assert_eq!(std::fs::read_to_string(done.path().join("a.txt")).unwrap(), "a");
    }

    #[tokio::test]
    async fn test_missing_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let dir = Dir::new(root.path().join("missing"));
        assert!(dir.is_empty().await.unwrap());
        dir.clear().await.unwrap();
        assert!(dir.exists().await);
    }

    #[test]
    fn test_basename() {
        assert_eq!(Dir::new("/var/www/html/site").basename(), "site");
    }
}
