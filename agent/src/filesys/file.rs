//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

use crate::errors::DeployError;

/// A file addressed by path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    pub async fn read_string(&self) -> Result<String, DeployError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the file's contents in one rename, so readers never see a partial write.
    /// Missing parent directories are created.
    pub async fn write_string(&self, contents: &str) -> Result<(), DeployError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staged = self.path.with_file_name(format!(".{}.{}", name, uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&staged, contents).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e.into());
        }
        fs::rename(&staged, &self.path).await?;
        Ok(())
    }

    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), DeployError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_string(&contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_json_round_trip_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("nested").join("settings.json"));
        let value = HashMap::from([("log_level".to_string(), "debug".to_string())]);

        file.write_json(&value).await.unwrap();
        assert!(file.exists().await);

        let read: HashMap<String, String> = file.read_json().await.unwrap();
        assert_eq!(read, value);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("deployment_1.json"));
        file.write_string("first").await.unwrap();
        file.write_string("second").await.unwrap();

        assert_eq!(file.read_string().await.unwrap(), "second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
