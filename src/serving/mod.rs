//! Serving runtime: owns the active pipeline and answers predictions.
//!
//! The runtime starts `Unloaded`. The first prediction (or an explicit
//! [`ServingRuntime::refresh`]) loads the best registered model. Loads are
//! serialized by an async mutex and the active pipeline is swapped as a single
//! `Arc` only after it is fully decoded, so in-flight predictions keep the
//! pipeline they started with.

use crate::artifacts::ArtifactStore;
use crate::config::ServingConfig;
use crate::error::{AppError, Result};
use crate::extraction::UrlFeatureSource;
use crate::metrics::{
    FEEDBACK_WRITES_TOTAL, MODEL_LOADED, MODEL_LOADS_TOTAL, PREDICTIONS_TOTAL,
    PREDICTION_DURATION_SECONDS, PREDICTION_ERRORS_TOTAL,
};
use crate::ml::{ModelInput, UrlPipeline};
use crate::models::{CorpusRow, Label, Metric, TrainedModel};
use crate::state::{CorpusCollection, CorpusStore, ModelRegistry};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Lifecycle of the active pipeline slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    Unloaded,
    Loading,
    Ready,
}

/// A decoded pipeline tagged with its registry version
pub struct ActivePipeline {
    pub pipeline: UrlPipeline,
    pub model: TrainedModel,
    pub loaded_at: DateTime<Utc>,
}

impl ActivePipeline {
    pub fn version_id(&self) -> &str {
        &self.model.version_id
    }
}

/// Result of a load or refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { version_id: String },
    Unchanged { version_id: String },
}

impl LoadOutcome {
    pub fn version_id(&self) -> &str {
        match self {
            LoadOutcome::Loaded { version_id } | LoadOutcome::Unchanged { version_id } => {
                version_id
            }
        }
    }
}

/// Answer for one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub label: Label,

    /// Probability of the predicted class
    pub probability: f64,

    pub version_id: String,
}

/// Point-in-time view of the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub state: RuntimeState,
    pub model: Option<TrainedModel>,
    pub loaded_at: Option<DateTime<Utc>>,
}

pub struct ServingRuntime {
    registry: Arc<dyn ModelRegistry>,
    corpus: Arc<dyn CorpusStore>,
    artifacts: Arc<dyn ArtifactStore>,
    features: Arc<dyn UrlFeatureSource>,
    container: String,
    selection_metric: Metric,
    state: RwLock<RuntimeState>,
    active: RwLock<Option<Arc<ActivePipeline>>>,
    load_lock: Mutex<()>,
}

impl ServingRuntime {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        corpus: Arc<dyn CorpusStore>,
        artifacts: Arc<dyn ArtifactStore>,
        features: Arc<dyn UrlFeatureSource>,
        container: impl Into<String>,
        config: &ServingConfig,
    ) -> Self {
        Self {
            registry,
            corpus,
            artifacts,
            features,
            container: container.into(),
            selection_metric: config.selection_metric,
            state: RwLock::new(RuntimeState::Unloaded),
            active: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == RuntimeState::Ready
    }

    /// Currently active pipeline, if any
    pub fn active(&self) -> Option<Arc<ActivePipeline>> {
        self.active.read().clone()
    }

    pub fn status(&self) -> RuntimeStatus {
        let active = self.active();
        RuntimeStatus {
            state: self.state(),
            model: active.as_ref().map(|a| a.model.clone()),
            loaded_at: active.as_ref().map(|a| a.loaded_at),
        }
    }

    /// Load the best model unless one is already active
    pub async fn ensure_loaded(&self) -> Result<Arc<ActivePipeline>> {
        if let Some(active) = self.active() {
            return Ok(active);
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished loading while this one waited
        if let Some(active) = self.active() {
            return Ok(active);
        }

        self.load_locked().await?;
        self.active()
            .ok_or_else(|| AppError::ModelUnavailable("No model loaded".to_string()))
    }

    /// Swap in the best registered model when its version differs from the
    /// active one. On failure the previous pipeline keeps serving.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let _guard = self.load_lock.lock().await;
        self.load_locked().await
    }

    async fn load_locked(&self) -> Result<LoadOutcome> {
        let previous = self.state();
        *self.state.write() = RuntimeState::Loading;

        match self.fetch_best().await {
            Ok(Some(active)) => {
                let version_id = active.version_id().to_string();
                *self.active.write() = Some(active);
                *self.state.write() = RuntimeState::Ready;

                MODEL_LOADS_TOTAL.with_label_values(&["loaded"]).inc();
                MODEL_LOADED.set(1.0);
                info!(version_id = %version_id, "Pipeline loaded");
                Ok(LoadOutcome::Loaded { version_id })
            }
            Ok(None) => {
                *self.state.write() = previous;
                MODEL_LOADS_TOTAL.with_label_values(&["unchanged"]).inc();

                let version_id = self
                    .active()
                    .map(|a| a.version_id().to_string())
                    .unwrap_or_default();
                debug!(version_id = %version_id, "Best model already active");
                Ok(LoadOutcome::Unchanged { version_id })
            }
            Err(e) => {
                *self.state.write() = previous;
                MODEL_LOADS_TOTAL.with_label_values(&["failed"]).inc();
                warn!(error = %e, state = ?previous, "Pipeline load failed");

                Err(match e {
                    AppError::ModelUnavailable(_) => e,
                    other => AppError::ModelUnavailable(format!("Failed to load model: {}", other)),
                })
            }
        }
    }

    /// Decoded best model, or `None` when it is already active
    async fn fetch_best(&self) -> Result<Option<Arc<ActivePipeline>>> {
        let model = self
            .registry
            .best_by(self.selection_metric)
            .await?
            .ok_or_else(|| AppError::ModelUnavailable("No trained model in registry".to_string()))?;

        if let Some(active) = self.active() {
            if active.version_id() == model.version_id {
                return Ok(None);
            }
        }

        let bytes = self
            .artifacts
            .get(&self.container, &model.artifact_key())
            .await?;

        let version_id = model.version_id.clone();
        let pipeline = tokio::task::spawn_blocking(move || {
            UrlPipeline::from_artifact(&bytes, &version_id)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Artifact decode task failed: {}", e)))??;

        Ok(Some(Arc::new(ActivePipeline {
            pipeline,
            model,
            loaded_at: Utc::now(),
        })))
    }

    /// Classify a URL and append the observed row to the train corpus
    pub async fn predict(&self, url: &str) -> Result<PredictionOutcome> {
        let started = Instant::now();

        let active = match self.ensure_loaded().await {
            Ok(active) => active,
            Err(e) => {
                PREDICTION_ERRORS_TOTAL
                    .with_label_values(&["model_unavailable"])
                    .inc();
                error!(url, error = %e, "No model available for prediction");
                return Err(e);
            }
        };

        let record = self.features.extract(url).await;
        let input = ModelInput::from_record(&record);

        let proba = match active.pipeline.predict_proba(std::slice::from_ref(&input)) {
            Ok(proba) => proba,
            Err(e) => {
                PREDICTION_ERRORS_TOTAL
                    .with_label_values(&["inference"])
                    .inc();
                error!(url, version_id = %active.version_id(), error = %e, "Inference failed");
                return Err(e);
            }
        };

        let p_bad = proba[[0, 1]];
        let (label, probability) = if p_bad > 0.5 {
            (Label::Bad, p_bad)
        } else {
            (Label::Good, proba[[0, 0]])
        };

        let feedback = CorpusRow::from_feedback(&record, label);
        match self.corpus.insert_one(CorpusCollection::Train, &feedback).await {
            Ok(()) => FEEDBACK_WRITES_TOTAL.with_label_values(&["ok"]).inc(),
            Err(e) => {
                FEEDBACK_WRITES_TOTAL.with_label_values(&["error"]).inc();
                warn!(url, error = %e, "Failed to append feedback row");
            }
        }

        PREDICTIONS_TOTAL.with_label_values(&[label.as_str()]).inc();
        PREDICTION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        info!(
            url,
            label = %label,
            probability,
            version_id = %active.version_id(),
            "Prediction served"
        );

        Ok(PredictionOutcome {
            label,
            probability,
            version_id: active.version_id().to_string(),
        })
    }
}
