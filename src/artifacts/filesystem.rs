use crate::artifacts::{validate_name, ArtifactStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Artifact store on the local filesystem, one directory per container
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!("Failed to create artifact root {:?}: {}", root, e))
        })?;
        Ok(Self { root })
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf> {
        validate_name("container", container)?;
        Ok(self.root.join(container))
    }

    fn blob_path(&self, container: &str, key: &str) -> Result<PathBuf> {
        validate_name("key", key)?;
        Ok(self.container_dir(container)?.join(key))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.blob_path(container, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::Conflict(format!(
                    "Artifact {}/{} already exists",
                    container, key
                )));
            }
            Err(e) => {
                tracing::error!(container, key, error = %e, "Failed to create artifact");
                return Err(AppError::Storage(format!("Failed to create {:?}: {}", path, e)));
            }
        };

        let written = async {
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            tracing::error!(container, key, error = %e, "Failed to write artifact");
            // A partial blob must not be mistaken for a complete one
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::Storage(format!("Failed to write {:?}: {}", path, e)));
        }

        tracing::debug!(container, key, bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(container, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(format!(
                "Artifact {}/{} not found",
                container, key
            ))),
            Err(e) => {
                tracing::error!(container, key, error = %e, "Failed to read artifact");
                Err(AppError::Storage(format!("Failed to read {:?}: {}", path, e)))
            }
        }
    }

    async fn list(&self, container: &str) -> Result<Vec<String>> {
        let dir = self.container_dir(container)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Storage(format!("Failed to list {:?}: {}", dir, e))),
        };

        let mut keys = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name("key", name).is_ok() {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
