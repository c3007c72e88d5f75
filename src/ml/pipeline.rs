use crate::error::{AppError, Result};
use crate::ml::boosting::{Classifier, GradientBoostedClassifier};
use crate::ml::models::{LabeledRow, ModelInput, PipelineConfig};
use crate::ml::transform::FeatureTransformer;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

/// Bumped whenever the serialized pipeline layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Facts about a fitted pipeline carried inside its artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub fitted_at: DateTime<Utc>,
    pub n_training_rows: usize,
    pub feature_names: Vec<String>,
    pub config: PipelineConfig,
}

/// Feature transformation and classifier fitted together
#[derive(Debug, Serialize, Deserialize)]
pub struct UrlPipeline {
    metadata: ModelMetadata,
    transformer: FeatureTransformer,
    classifier: GradientBoostedClassifier,
}

impl UrlPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            metadata: ModelMetadata {
                fitted_at: Utc::now(),
                n_training_rows: 0,
                feature_names: Vec::new(),
                config: config.clone(),
            },
            transformer: FeatureTransformer::new(&config),
            classifier: GradientBoostedClassifier::new(config.boosting),
        }
    }

    /// Fit transformer and classifier on labeled rows
    pub fn fit(&mut self, rows: &[LabeledRow]) -> Result<()> {
        let inputs: Vec<ModelInput> = rows.iter().map(|r| r.input.clone()).collect();
        let labels: Vec<u8> = rows.iter().map(|r| r.label).collect();

        let features = self.transformer.fit_transform(&inputs)?;
        self.classifier.fit(&features, &labels)?;

        self.metadata.fitted_at = Utc::now();
        self.metadata.n_training_rows = rows.len();
        self.metadata.feature_names = self.transformer.feature_names();

        info!(
            rows = rows.len(),
            features = self.transformer.n_features(),
            "Pipeline fitted"
        );

        Ok(())
    }

    pub fn predict(&self, inputs: &[ModelInput]) -> Result<Vec<u8>> {
        let features = self.transformer.transform(inputs)?;
        self.classifier.predict(&features)
    }

    /// Class probabilities, one `[p(good), p(bad)]` row per input
    pub fn predict_proba(&self, inputs: &[ModelInput]) -> Result<Array2<f64>> {
        let features = self.transformer.transform(inputs)?;
        self.classifier.predict_proba(&features)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn is_fitted(&self) -> bool {
        self.transformer.is_fitted() && self.classifier.is_trained()
    }

    /// Serialize into an artifact tagged with `version_id`
    pub fn to_artifact(&self, version_id: &str) -> Result<Vec<u8>> {
        if !self.is_fitted() {
            return Err(AppError::Internal(
                "Refusing to publish an unfitted pipeline".to_string(),
            ));
        }

        let payload = bincode::serialize(self)?;
        let envelope = ArtifactEnvelope {
            format_version: ARTIFACT_FORMAT_VERSION,
            version_id: version_id.to_string(),
            sha256: digest(&payload),
            payload,
        };

        Ok(bincode::serialize(&envelope)?)
    }

    /// Decode an artifact, checking its format version, digest and tag
    pub fn from_artifact(bytes: &[u8], expected_version: &str) -> Result<Self> {
        let envelope: ArtifactEnvelope = bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("Corrupt artifact: {}", e)))?;

        if envelope.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "Corrupt artifact: format version {} (expected {})",
                envelope.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if envelope.version_id != expected_version {
            return Err(AppError::Serialization(format!(
                "Corrupt artifact: tagged {} but requested {}",
                envelope.version_id, expected_version
            )));
        }
        if digest(&envelope.payload) != envelope.sha256 {
            return Err(AppError::Serialization(
                "Corrupt artifact: payload digest mismatch".to_string(),
            ));
        }

        let pipeline: UrlPipeline = bincode::deserialize(&envelope.payload)?;
        Ok(pipeline)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    version_id: String,
    sha256: String,
    payload: Vec<u8>,
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::models::{BoostingConfig, KMeansConfig, TfidfConfig};

    pub(crate) fn fixture_rows() -> Vec<LabeledRow> {
        let good = [
            ("https://www.shop.com/cart", "cart checkout shipping returns"),
            ("https://www.news.org/world", "world news weather sports"),
            ("https://www.library.edu/books", "books catalogue reading room"),
            ("https://www.shop.com/deals", "deals checkout shipping discount"),
        ];
        let bad = [
            ("http://verify-account.xyz/login", "verify account password urgent"),
            ("http://secure-bank.top/update", "update bank password urgent"),
            ("http://paypal.login-check.ru/", "confirm password account suspended"),
            ("http://free-prize.xyz/claim", "claim prize winner password"),
        ];

        let mut rows = Vec::new();
        for (label, set, tld, https) in [(0u8, &good, "com", "yes"), (1u8, &bad, "xyz", "no")] {
            for (url, content) in set.iter() {
                rows.push(LabeledRow {
                    input: ModelInput::normalized(
                        url,
                        url.len() as u64,
                        if label == 0 { "France" } else { "Unknown" },
                        tld,
                        if label == 0 { "complete" } else { "incomplete" },
                        https,
                        if label == 0 { 120 } else { 3 },
                        content,
                    ),
                    label,
                });
            }
        }
        rows
    }

    pub(crate) fn small_config() -> PipelineConfig {
        PipelineConfig {
            tfidf: TfidfConfig {
                min_df: 1,
                ..TfidfConfig::default()
            },
            kmeans: KMeansConfig {
                n_clusters: 2,
                ..KMeansConfig::default()
            },
            boosting: BoostingConfig {
                n_estimators: 10,
                ..BoostingConfig::default()
            },
        }
    }

    #[test]
    fn test_fit_and_predict() {
        let rows = fixture_rows();
        let mut pipeline = UrlPipeline::new(small_config());
        pipeline.fit(&rows).unwrap();

        assert!(pipeline.is_fitted());
        assert_eq!(pipeline.metadata().n_training_rows, 8);
        assert_eq!(pipeline.metadata().feature_names.len(), 8);

        let inputs: Vec<ModelInput> = rows.iter().map(|r| r.input.clone()).collect();
        let labels: Vec<u8> = rows.iter().map(|r| r.label).collect();
        assert_eq!(pipeline.predict(&inputs).unwrap(), labels);

        let proba = pipeline.predict_proba(&inputs[..1]).unwrap();
        assert!(proba[[0, 0]] > 0.5);
    }

    #[test]
    fn test_artifact_roundtrip() {
        let rows = fixture_rows();
        let mut pipeline = UrlPipeline::new(small_config());
        pipeline.fit(&rows).unwrap();

        let bytes = pipeline.to_artifact("abc123").unwrap();
        let restored = UrlPipeline::from_artifact(&bytes, "abc123").unwrap();

        let inputs: Vec<ModelInput> = rows.iter().map(|r| r.input.clone()).collect();
        assert_eq!(
            restored.predict_proba(&inputs).unwrap(),
            pipeline.predict_proba(&inputs).unwrap()
        );
        assert_eq!(restored.metadata(), pipeline.metadata());
    }

    #[test]
    fn test_corrupt_artifacts_are_rejected() {
        let rows = fixture_rows();
        let mut pipeline = UrlPipeline::new(small_config());
        pipeline.fit(&rows).unwrap();
        let bytes = pipeline.to_artifact("abc123").unwrap();

        assert!(UrlPipeline::from_artifact(&bytes, "other").is_err());
        assert!(UrlPipeline::from_artifact(&bytes[..bytes.len() / 2], "abc123").is_err());

        let mut flipped = bytes.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xff;
        assert!(UrlPipeline::from_artifact(&flipped, "abc123").is_err());
    }

    #[test]
    fn test_unfitted_pipeline_cannot_be_published() {
        let pipeline = UrlPipeline::new(small_config());
        assert!(pipeline.to_artifact("v1").is_err());
    }
}
