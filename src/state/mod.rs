pub mod factory;
pub mod sled_store;
pub mod store;

pub use factory::{create_in_memory_stores, create_stores, Stores};
pub use sled_store::SledStore;
pub use store::InMemoryStore;

use crate::error::Result;
use crate::models::{CorpusRow, Metric, TrainedModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry of trained models, append-only
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Record a new model; a second entry with the same version id is a conflict
    async fn record(&self, model: &TrainedModel) -> Result<()>;

    /// Every model in insertion order
    async fn list_models(&self) -> Result<Vec<TrainedModel>>;

    /// Get a model by version id
    async fn get_model(&self, version_id: &str) -> Result<Option<TrainedModel>>;

    /// Model with the highest value of `metric`, first inserted on ties
    async fn best_by(&self, metric: Metric) -> Result<Option<TrainedModel>> {
        Ok(select_best(self.list_models().await?, metric))
    }
}

/// Document collections holding feature rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusCollection {
    Train,
    Test,
}

impl CorpusCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusCollection::Train => "train",
            CorpusCollection::Test => "test",
        }
    }
}

impl fmt::Display for CorpusCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage for the `train` and `test` corpora
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Every row of a collection in insertion order
    async fn fetch_all(&self, collection: CorpusCollection) -> Result<Vec<CorpusRow>>;

    /// Append one row
    async fn insert_one(&self, collection: CorpusCollection, row: &CorpusRow) -> Result<()>;

    /// Append rows, returning how many were written
    async fn insert_many(&self, collection: CorpusCollection, rows: &[CorpusRow]) -> Result<usize>;

    /// Number of rows in a collection
    async fn count(&self, collection: CorpusCollection) -> Result<u64>;
}

/// Strictly-greater scan: the earliest model wins ties and NaN scores never win
pub fn select_best<I>(models: I, metric: Metric) -> Option<TrainedModel>
where
    I: IntoIterator<Item = TrainedModel>,
{
    let mut best: Option<(f64, TrainedModel)> = None;

    for model in models {
        let score = model.metric(metric);
        if score.is_nan() {
            continue;
        }
        match &best {
            Some((top, _)) if score <= *top => {}
            _ => best = Some((score, model)),
        }
    }

    best.map(|(_, model)| model)
}
