//! Blob storage for serialized pipelines.
//!
//! Artifacts are immutable: a key can be written once per container and is
//! never overwritten or deleted.

pub mod filesystem;
pub mod memory;

pub use filesystem::FsArtifactStore;
pub use memory::InMemoryArtifactStore;

use crate::config::{ArtifactBackend, ArtifactConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Blob storage addressed by container and key
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store bytes under a new key; an existing key is a conflict
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch the bytes stored under a key
    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>>;

    /// Keys in a container, sorted
    async fn list(&self, container: &str) -> Result<Vec<String>>;
}

/// Container and key names must be a single plain path segment
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid {} name '{}'", kind, name)))
    }
}

/// Create an artifact store based on configuration
pub async fn create_artifact_store(config: &ArtifactConfig) -> Result<Arc<dyn ArtifactStore>> {
    match config.backend {
        ArtifactBackend::Filesystem => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Filesystem artifact backend requires 'path' configuration".to_string(),
                )
            })?;

            tracing::info!(path = ?path, "Initializing filesystem artifact store");

            Ok(Arc::new(FsArtifactStore::new(path).await?))
        }

        ArtifactBackend::Memory => {
            tracing::info!("Initializing in-memory artifact store");
            Ok(Arc::new(InMemoryArtifactStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_name_validation() {
        assert!(validate_name("key", "0f3a9c.bin").is_ok());
        assert!(validate_name("container", "models").is_ok());
        assert!(validate_name("key", "").is_err());
        assert!(validate_name("key", "../etc/passwd").is_err());
        assert!(validate_name("key", "a/b.bin").is_err());
        assert!(validate_name("key", ".hidden").is_err());
    }

    #[tokio::test]
    async fn test_filesystem_backend_requires_path() {
        let config = ArtifactConfig {
            backend: ArtifactBackend::Filesystem,
            path: None,
            container: "models".to_string(),
        };
        assert!(create_artifact_store(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_create_filesystem_backend() {
        let temp_dir = TempDir::new().unwrap();
        let config = ArtifactConfig {
            backend: ArtifactBackend::Filesystem,
            path: Some(temp_dir.path().to_path_buf()),
            container: "models".to_string(),
        };

        let store = create_artifact_store(&config).await.unwrap();
        assert!(store.list("models").await.unwrap().is_empty());
    }
}
