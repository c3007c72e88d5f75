use crate::error::{AppError, Result};
use crate::models::{CorpusRow, TrainedModel};
use crate::state::{CorpusCollection, CorpusStore, ModelRegistry};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory registry and corpus (for development and testing)
#[derive(Clone)]
pub struct InMemoryStore {
    /// version_id -> (insertion sequence, model)
    models: Arc<DashMap<String, (u64, TrainedModel)>>,
    sequence: Arc<AtomicU64>,
    train: Arc<RwLock<Vec<CorpusRow>>>,
    test: Arc<RwLock<Vec<CorpusRow>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            models: Arc::new(DashMap::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            train: Arc::new(RwLock::new(Vec::new())),
            test: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn collection(&self, collection: CorpusCollection) -> &RwLock<Vec<CorpusRow>> {
        match collection {
            CorpusCollection::Train => &self.train,
            CorpusCollection::Test => &self.test,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryStore {
    async fn record(&self, model: &TrainedModel) -> Result<()> {
        match self.models.entry(model.version_id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Model {} is already registered",
                model.version_id
            ))),
            Entry::Vacant(slot) => {
                let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
                slot.insert((seq, model.clone()));
                tracing::debug!(version_id = %model.version_id, "Model recorded");
                Ok(())
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<TrainedModel>> {
        let mut entries: Vec<(u64, TrainedModel)> =
            self.models.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, model)| model).collect())
    }

    async fn get_model(&self, version_id: &str) -> Result<Option<TrainedModel>> {
        Ok(self.models.get(version_id).map(|entry| entry.value().1.clone()))
    }
}

#[async_trait]
impl CorpusStore for InMemoryStore {
    async fn fetch_all(&self, collection: CorpusCollection) -> Result<Vec<CorpusRow>> {
        Ok(self.collection(collection).read().clone())
    }

    async fn insert_one(&self, collection: CorpusCollection, row: &CorpusRow) -> Result<()> {
        self.collection(collection).write().push(row.clone());
        Ok(())
    }

    async fn insert_many(&self, collection: CorpusCollection, rows: &[CorpusRow]) -> Result<usize> {
        self.collection(collection).write().extend_from_slice(rows);
        Ok(rows.len())
    }

    async fn count(&self, collection: CorpusCollection) -> Result<u64> {
        Ok(self.collection(collection).read().len() as u64)
    }
}
