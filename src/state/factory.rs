use crate::config::{StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{CorpusStore, InMemoryStore, ModelRegistry, SledStore};
use std::sync::Arc;

/// Registry and corpus handles backed by the same store
#[derive(Clone)]
pub struct Stores {
    pub registry: Arc<dyn ModelRegistry>,
    pub corpus: Arc<dyn CorpusStore>,
}

impl Stores {
    fn shared<S>(store: S) -> Self
    where
        S: ModelRegistry + CorpusStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            registry: store.clone(),
            corpus: store,
        }
    }
}

/// Create the registry and corpus stores based on configuration
pub async fn create_stores(config: &StateConfig) -> Result<Stores> {
    match config.backend {
        StateBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            Ok(Stores::shared(SledStore::new(path)?))
        }

        StateBackend::Memory => Ok(create_in_memory_stores()),
    }
}

/// Create in-memory stores (for testing and development)
pub fn create_in_memory_stores() -> Stores {
    tracing::info!("Initializing in-memory storage backend");
    Stores::shared(InMemoryStore::new())
}
