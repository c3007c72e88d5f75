use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Evaluation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The test split holds no rows of one class
    #[error("test split has no rows with true class {class}")]
    DegenerateTestSplit { class: u8 },

    #[error("{truth} true labels but {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },
}

/// 2×2 confusion matrix, class 0 = good, class 1 = bad
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn from_predictions(
        truth: &[u8],
        predicted: &[u8],
    ) -> std::result::Result<Self, EvaluationError> {
        if truth.len() != predicted.len() {
            return Err(EvaluationError::LengthMismatch {
                truth: truth.len(),
                predicted: predicted.len(),
            });
        }

        let mut matrix = Self::default();
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            match (t, p) {
                (0, 0) => matrix.true_negative += 1,
                (0, _) => matrix.false_positive += 1,
                (_, 0) => matrix.false_negative += 1,
                _ => matrix.true_positive += 1,
            }
        }

        Ok(matrix)
    }

    pub fn total(&self) -> u64 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

/// Scores recorded with every trained model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub false_positive: f64,
    pub false_negative: f64,
    pub true_positive: f64,
    pub true_negative: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl EvaluationMetrics {
    /// Derive rates from a confusion matrix.
    ///
    /// Both rows must be non-empty. Precision is 0 when nothing was predicted
    /// positive and f1 is 0 when precision and recall are both 0.
    pub fn from_confusion(
        matrix: &ConfusionMatrix,
    ) -> std::result::Result<Self, EvaluationError> {
        let ConfusionMatrix {
            true_negative: tn,
            false_positive: fp,
            false_negative: fn_,
            true_positive: tp,
        } = *matrix;

        let negatives = (tn + fp) as f64;
        let positives = (fn_ + tp) as f64;
        if negatives == 0.0 {
            return Err(EvaluationError::DegenerateTestSplit { class: 0 });
        }
        if positives == 0.0 {
            return Err(EvaluationError::DegenerateTestSplit { class: 1 });
        }

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            warn!("No positive predictions, precision set to 0");
            0.0
        };
        let recall = tp as f64 / positives;

        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            warn!("Precision and recall are both 0, f1 set to 0");
            0.0
        };

        Ok(Self {
            accuracy: (tp + tn) as f64 / matrix.total() as f64,
            false_positive: fp as f64 / negatives,
            false_negative: fn_ as f64 / positives,
            true_positive: tp as f64 / positives,
            true_negative: tn as f64 / negatives,
            precision,
            recall,
            f1_score,
        })
    }

    pub fn evaluate(truth: &[u8], predicted: &[u8]) -> std::result::Result<Self, EvaluationError> {
        Self::from_confusion(&ConfusionMatrix::from_predictions(truth, predicted)?)
    }
}
