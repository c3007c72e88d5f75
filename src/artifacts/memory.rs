use crate::artifacts::{validate_name, ArtifactStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory artifact store (for testing and development)
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    blobs: Arc<DashMap<(String, String), Arc<Vec<u8>>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        validate_name("container", container)?;
        validate_name("key", key)?;

        match self.blobs.entry((container.to_string(), key.to_string())) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Artifact {}/{} already exists",
                container, key
            ))),
            Entry::Vacant(slot) => {
                tracing::debug!(container, key, bytes = bytes.len(), "Artifact stored");
                slot.insert(Arc::new(bytes));
                Ok(())
            }
        }
    }

    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(&(container.to_string(), key.to_string()))
            .map(|entry| entry.value().as_ref().clone())
            .ok_or_else(|| AppError::NotFound(format!("Artifact {}/{} not found", container, key)))
    }

    async fn list(&self, container: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .blobs
            .iter()
            .filter(|entry| entry.key().0 == container)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
