use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::ml::evaluation::EvaluationMetrics;

/// Registry entry describing one fitted pipeline and its evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Unique version identifier, also the artifact name
    #[serde(rename = "model_id")]
    pub version_id: String,

    pub accuracy: f64,
    pub false_positive: f64,
    pub false_negative: f64,
    pub true_positive: f64,
    pub true_negative: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub n_train_rows: usize,

    #[serde(default)]
    pub n_test_rows: usize,
}

impl TrainedModel {
    pub fn new(version_id: impl Into<String>, metrics: &EvaluationMetrics) -> Self {
        Self {
            version_id: version_id.into(),
            accuracy: metrics.accuracy,
            false_positive: metrics.false_positive,
            false_negative: metrics.false_negative,
            true_positive: metrics.true_positive,
            true_negative: metrics.true_negative,
            precision: metrics.precision,
            recall: metrics.recall,
            f1_score: metrics.f1_score,
            created_at: Utc::now(),
            n_train_rows: 0,
            n_test_rows: 0,
        }
    }

    pub fn with_row_counts(mut self, n_train_rows: usize, n_test_rows: usize) -> Self {
        self.n_train_rows = n_train_rows;
        self.n_test_rows = n_test_rows;
        self
    }

    /// Value of a registry metric for this entry
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::FalsePositive => self.false_positive,
            Metric::FalseNegative => self.false_negative,
            Metric::TruePositive => self.true_positive,
            Metric::TrueNegative => self.true_negative,
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::F1Score => self.f1_score,
        }
    }

    /// Name of the serialized pipeline in the artifact store
    pub fn artifact_key(&self) -> String {
        artifact_key(&self.version_id)
    }
}

pub fn artifact_key(version_id: &str) -> String {
    format!("{}.bin", version_id)
}

/// Metrics a registry lookup can rank by
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    Accuracy,
    FalsePositive,
    FalseNegative,
    TruePositive,
    TrueNegative,
    Precision,
    Recall,
    F1Score,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::F1Score
    }
}
