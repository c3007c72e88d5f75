use crate::artifacts::ArtifactStore;
use crate::error::{AppError, Result};
use crate::metrics::{TRAINING_DURATION_SECONDS, TRAINING_RUNS_TOTAL};
use crate::ml::evaluation::{ConfusionMatrix, EvaluationMetrics};
use crate::ml::models::{LabeledRow, ModelInput, PipelineConfig};
use crate::ml::pipeline::UrlPipeline;
use crate::ml::preprocess::preprocess;
use crate::models::{artifact_key, TrainedModel};
use crate::state::{CorpusCollection, CorpusStore, ModelRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of one published training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: TrainedModel,
    pub confusion: ConfusionMatrix,
}

/// Fit a pipeline on the training rows and score it on the test rows
pub fn train(
    train_rows: &[LabeledRow],
    test_rows: &[LabeledRow],
    config: PipelineConfig,
) -> Result<(UrlPipeline, EvaluationMetrics, ConfusionMatrix)> {
    let mut pipeline = UrlPipeline::new(config);
    pipeline.fit(train_rows)?;

    let inputs: Vec<ModelInput> = test_rows.iter().map(|r| r.input.clone()).collect();
    let truth: Vec<u8> = test_rows.iter().map(|r| r.label).collect();
    let predicted = pipeline.predict(&inputs)?;

    let confusion = ConfusionMatrix::from_predictions(&truth, &predicted)?;
    let metrics = EvaluationMetrics::from_confusion(&confusion)?;

    info!(
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1_score = metrics.f1_score,
        "Pipeline evaluated"
    );

    Ok((pipeline, metrics, confusion))
}

/// Periodic batch training over the stored corpora
pub struct TrainingService {
    registry: Arc<dyn ModelRegistry>,
    corpus: Arc<dyn CorpusStore>,
    artifacts: Arc<dyn ArtifactStore>,
    container: String,
    pipeline_config: PipelineConfig,
    interval: Duration,
}

impl TrainingService {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        corpus: Arc<dyn CorpusStore>,
        artifacts: Arc<dyn ArtifactStore>,
        container: impl Into<String>,
        pipeline_config: PipelineConfig,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            corpus,
            artifacts,
            container: container.into(),
            pipeline_config,
            interval,
        }
    }

    /// Fetch, preprocess, train, evaluate and publish once
    pub async fn run_once(&self) -> Result<TrainingReport> {
        let started = Instant::now();
        let result = self.execute().await;

        TRAINING_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        let outcome = if result.is_ok() { "published" } else { "failed" };
        TRAINING_RUNS_TOTAL.with_label_values(&[outcome]).inc();

        result
    }

    async fn execute(&self) -> Result<TrainingReport> {
        let train_raw = self.corpus.fetch_all(CorpusCollection::Train).await?;
        let test_raw = self.corpus.fetch_all(CorpusCollection::Test).await?;
        info!(
            train = train_raw.len(),
            test = test_raw.len(),
            "Fetched training corpora"
        );

        let train_rows = preprocess(train_raw)?;
        let test_rows = preprocess(test_raw)?;
        let (n_train, n_test) = (train_rows.len(), test_rows.len());

        let config = self.pipeline_config.clone();
        let (pipeline, metrics, confusion) =
            tokio::task::spawn_blocking(move || train(&train_rows, &test_rows, config))
                .await
                .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))??;

        let version_id = Uuid::new_v4().simple().to_string();
        let model = TrainedModel::new(version_id, &metrics).with_row_counts(n_train, n_test);
        self.publish(&pipeline, &model).await?;

        Ok(TrainingReport { model, confusion })
    }

    /// Upload the artifact, then record the registry entry.
    ///
    /// The registry never points at a missing artifact.
    pub async fn publish(&self, pipeline: &UrlPipeline, model: &TrainedModel) -> Result<()> {
        let bytes = pipeline.to_artifact(&model.version_id)?;
        let size = bytes.len();

        self.artifacts
            .put(&self.container, &artifact_key(&model.version_id), bytes)
            .await?;
        self.registry.record(model).await?;

        info!(
            version_id = %model.version_id,
            f1_score = model.f1_score,
            bytes = size,
            "Model published"
        );
        Ok(())
    }

    /// Train forever on the configured interval.
    ///
    /// Preprocessing and schema failures end the loop with an error; any other
    /// failed run is logged and retried after the interval.
    pub async fn run_forever(&self) -> Result<()> {
        loop {
            match self.run_once().await {
                Ok(report) => info!(
                    version_id = %report.model.version_id,
                    "Training run complete"
                ),
                Err(e) if e.is_unusable_training_data() => {
                    error!(error = %e, "Training data is unusable, stopping");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "Training run failed"),
            }

            info!(seconds = self.interval.as_secs(), "Sleeping until next training run");
            tokio::time::sleep(self.interval).await;
        }
    }
}
