use crate::error::{AppError, Result};
use crate::models::{CorpusRow, TrainedModel};
use crate::state::{CorpusCollection, CorpusStore, ModelRegistry};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent registry and corpus using the Sled embedded database.
///
/// Documents are stored as JSON so that schemaless corpus rows keep their
/// extra fields. Keys are ids from `Db::generate_id` in big-endian order, so
/// iterating a tree yields insertion order.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    models_tree: sled::Tree,
    version_index: sled::Tree,
    train_tree: sled::Tree,
    test_tree: sled::Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .map_err(|e| AppError::Database(format!("Failed to open Sled database: {}", e)))?;

        let open = |name: &str| {
            db.open_tree(name)
                .map_err(|e| AppError::Database(format!("Failed to open {} tree: {}", name, e)))
        };
        let models_tree = open("models")?;
        let version_index = open("models_by_version")?;
        let train_tree = open("corpus_train")?;
        let test_tree = open("corpus_test")?;

        tracing::info!("Initialized Sled store at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            models_tree,
            version_index,
            train_tree,
            test_tree,
        })
    }

    fn tree(&self, collection: CorpusCollection) -> &sled::Tree {
        match collection {
            CorpusCollection::Train => &self.train_tree,
            CorpusCollection::Test => &self.test_tree,
        }
    }

    fn next_key(&self) -> Result<[u8; 8]> {
        Ok(self.db.generate_id()?.to_be_bytes())
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(AppError::from)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(AppError::from)
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl ModelRegistry for SledStore {
    async fn record(&self, model: &TrainedModel) -> Result<()> {
        let key = self.next_key()?;

        // Claim the version id first; the index is the uniqueness check
        let claimed = self.version_index.compare_and_swap(
            model.version_id.as_bytes(),
            None::<&[u8]>,
            Some(key.to_vec()),
        )?;
        if claimed.is_err() {
            return Err(AppError::Conflict(format!(
                "Model {} is already registered",
                model.version_id
            )));
        }

        self.models_tree.insert(key, Self::encode(model)?)?;
        self.models_tree.flush()?;

        tracing::debug!(version_id = %model.version_id, "Model recorded in Sled");
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<TrainedModel>> {
        self.models_tree
            .iter()
            .map(|entry| {
                let (_, bytes) = entry?;
                Self::decode(&bytes)
            })
            .collect()
    }

    async fn get_model(&self, version_id: &str) -> Result<Option<TrainedModel>> {
        let Some(key) = self.version_index.get(version_id.as_bytes())? else {
            return Ok(None);
        };

        match self.models_tree.get(key)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CorpusStore for SledStore {
    async fn fetch_all(&self, collection: CorpusCollection) -> Result<Vec<CorpusRow>> {
        self.tree(collection)
            .iter()
            .map(|entry| {
                let (_, bytes) = entry?;
                Self::decode(&bytes)
            })
            .collect()
    }

    async fn insert_one(&self, collection: CorpusCollection, row: &CorpusRow) -> Result<()> {
        let key = self.next_key()?;
        let tree = self.tree(collection);
        tree.insert(key, Self::encode(row)?)?;
        tree.flush()?;
        Ok(())
    }

    async fn insert_many(&self, collection: CorpusCollection, rows: &[CorpusRow]) -> Result<usize> {
        let mut batch = sled::Batch::default();
        for row in rows {
            batch.insert(self.next_key()?.to_vec(), Self::encode(row)?);
        }

        let tree = self.tree(collection);
        tree.apply_batch(batch)?;
        tree.flush()?;

        tracing::debug!(collection = %collection, rows = rows.len(), "Rows inserted into Sled");
        Ok(rows.len())
    }

    async fn count(&self, collection: CorpusCollection) -> Result<u64> {
        Ok(self.tree(collection).len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::evaluation::EvaluationMetrics;
    use crate::models::{Metric, RawLabel};
    use serde_json::json;
    use tempfile::TempDir;

    fn model(id: &str, f1: f64) -> TrainedModel {
        let metrics = EvaluationMetrics {
            accuracy: 0.9,
            false_positive: 0.1,
            false_negative: 0.1,
            true_positive: 0.9,
            true_negative: 0.9,
            precision: 0.9,
            recall: 0.9,
            f1_score: f1,
        };
        TrainedModel::new(id, &metrics).with_row_counts(100, 20)
    }

    #[tokio::test]
    async fn test_registry_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        store.record(&model("v1", 0.80)).await.unwrap();
        store.record(&model("v2", 0.92)).await.unwrap();
        store.record(&model("v3", 0.92)).await.unwrap();

        assert_eq!(store.list_models().await.unwrap().len(), 3);
        let best = store.best_by(Metric::F1Score).await.unwrap().unwrap();
        assert_eq!(best.version_id, "v2");
        assert_eq!(best.n_train_rows, 100);

        let fetched = store.get_model("v3").await.unwrap().unwrap();
        assert_eq!(fetched, model_with_time("v3", 0.92, fetched.created_at));
        assert!(store.get_model("missing").await.unwrap().is_none());
    }

    fn model_with_time(id: &str, f1: f64, at: chrono::DateTime<chrono::Utc>) -> TrainedModel {
        let mut m = model(id, f1);
        m.created_at = at;
        m
    }

    #[tokio::test]
    async fn test_duplicate_version_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        store.record(&model("v1", 0.5)).await.unwrap();
        let err = store.record(&model("v1", 0.7)).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.list_models().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = SledStore::new(temp_dir.path()).unwrap();
            store.record(&model("v1", 0.5)).await.unwrap();
            store
                .insert_one(CorpusCollection::Train, &CorpusRow::default())
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let store = SledStore::new(temp_dir.path()).unwrap();
        assert!(store.get_model("v1").await.unwrap().is_some());
        assert_eq!(store.count(CorpusCollection::Train).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corpus_rows_keep_extra_fields_and_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();

        let mut first = CorpusRow {
            url: Some("http://a.com".to_string()),
            label: Some(RawLabel::Text("good".to_string())),
            ..CorpusRow::default()
        };
        first.extra.insert("page_rank".to_string(), json!(4));
        let second = CorpusRow {
            url: Some("http://b.com".to_string()),
            label: Some(RawLabel::Encoded(1)),
            ..CorpusRow::default()
        };

        let written = store
            .insert_many(CorpusCollection::Test, &[first.clone(), second.clone()])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let rows = store.fetch_all(CorpusCollection::Test).await.unwrap();
        assert_eq!(rows, vec![first, second]);
        assert_eq!(store.count(CorpusCollection::Train).await.unwrap(), 0);
    }
}
