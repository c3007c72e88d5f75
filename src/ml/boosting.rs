use crate::error::{AppError, Result};
use crate::ml::models::BoostingConfig;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::debug;

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Keeps the prior log-odds finite on single-class data
const PRIOR_CLIP: f64 = 1e-6;

/// Trait for binary classifiers over transformed feature matrices
pub trait Classifier: Send + Sync {
    /// Train the classifier; labels are 0 or 1
    fn fit(&mut self, features: &Array2<f64>, labels: &[u8]) -> Result<()>;

    /// Predict class labels
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<u8>>;

    /// Predict class probabilities, one `[p(0), p(1)]` row per sample
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Gradient-boosted regression trees on the binary log-loss
#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    config: BoostingConfig,

    /// Log-odds of the training prior
    base_score: f64,

    trees: Vec<RegressionTree>,

    trained: bool,
}

impl GradientBoostedClassifier {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            trees: Vec::new(),
            trained: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
        let shape = arr.shape();
        let data: Vec<f64> = arr.iter().copied().collect();
        DenseMatrix::new(shape[0], shape[1], data, false)
    }

    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.config.max_depth)
            .with_min_samples_leaf(self.config.min_samples_leaf.max(1))
    }

    /// Raw margin (log-odds) per row
    fn decision_function(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        if !self.trained {
            return Err(AppError::Internal("Model not trained".to_string()));
        }

        let mut margin = vec![self.base_score; features.nrows()];
        if features.nrows() == 0 {
            return Ok(margin);
        }

        let x = Self::ndarray_to_densematrix(features);
        for tree in &self.trees {
            let step = tree
                .predict(&x)
                .map_err(|e| AppError::Internal(format!("Prediction failed: {}", e)))?;
            for (m, s) in margin.iter_mut().zip(step.iter()) {
                *m += self.config.learning_rate * s;
            }
        }

        Ok(margin)
    }
}

impl Classifier for GradientBoostedClassifier {
    fn fit(&mut self, features: &Array2<f64>, labels: &[u8]) -> Result<()> {
        let n = features.nrows();
        if n == 0 {
            return Err(AppError::Internal(
                "Cannot train on an empty feature matrix".to_string(),
            ));
        }
        if labels.len() != n {
            return Err(AppError::Schema(format!(
                "{} labels for {} feature rows",
                labels.len(),
                n
            )));
        }

        let targets: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let prior = (targets.iter().sum::<f64>() / n as f64).clamp(PRIOR_CLIP, 1.0 - PRIOR_CLIP);
        self.base_score = (prior / (1.0 - prior)).ln();

        let x = Self::ndarray_to_densematrix(features);
        let mut margin = vec![self.base_score; n];
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for round in 0..self.config.n_estimators {
            // Negative gradient of the log-loss
            let residuals: Vec<f64> = targets
                .iter()
                .zip(margin.iter())
                .map(|(y, f)| y - sigmoid(*f))
                .collect();

            let tree = RegressionTree::fit(&x, &residuals, self.tree_parameters()).map_err(|e| {
                AppError::Internal(format!("Failed to fit boosting round {}: {}", round, e))
            })?;

            let step = tree
                .predict(&x)
                .map_err(|e| AppError::Internal(format!("Prediction failed: {}", e)))?;
            for (m, s) in margin.iter_mut().zip(step.iter()) {
                *m += self.config.learning_rate * s;
            }

            trees.push(tree);
        }

        debug!(
            rounds = trees.len(),
            base_score = self.base_score,
            "Gradient boosting finished"
        );

        self.trees = trees;
        self.trained = true;
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(self
            .decision_function(features)?
            .into_iter()
            .map(|m| u8::from(sigmoid(m) > 0.5))
            .collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let margin = self.decision_function(features)?;
        let mut proba = Array2::zeros((margin.len(), 2));

        for (i, m) in margin.into_iter().enumerate() {
            let p = sigmoid(m);
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }

        Ok(proba)
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize) -> (Array2<f64>, Vec<u8>) {
        let data: Vec<f64> = (0..n).flat_map(|i| [i as f64, (i % 3) as f64]).collect();
        let features = Array2::from_shape_vec((n, 2), data).unwrap();
        let labels = (0..n).map(|i| u8::from(i >= n / 2)).collect();
        (features, labels)
    }

    fn small_config() -> BoostingConfig {
        BoostingConfig {
            n_estimators: 20,
            ..BoostingConfig::default()
        }
    }

    #[test]
    fn test_fits_separable_data() {
        let (features, labels) = separable(40);
        let mut classifier = GradientBoostedClassifier::new(small_config());

        assert!(!classifier.is_trained());
        classifier.fit(&features, &labels).unwrap();
        assert!(classifier.is_trained());
        assert_eq!(classifier.n_trees(), 20);

        let predictions = classifier.predict(&features).unwrap();
        assert_eq!(predictions, labels);
    }

    #[test]
    fn test_probabilities_are_normalized() {
        let (features, labels) = separable(30);
        let mut classifier = GradientBoostedClassifier::new(small_config());
        classifier.fit(&features, &labels).unwrap();

        let proba = classifier.predict_proba(&features).unwrap();
        assert_eq!(proba.shape(), &[30, 2]);
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-9);
            assert!(row[1] >= 0.0 && row[1] <= 1.0);
        }
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[29, 1]] > 0.5);
    }

    #[test]
    fn test_single_class_training() {
        let (features, _) = separable(10);
        let labels = vec![0u8; 10];
        let mut classifier = GradientBoostedClassifier::new(small_config());
        classifier.fit(&features, &labels).unwrap();

        assert!(classifier.predict(&features).unwrap().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_survives_serialization() {
        let (features, labels) = separable(20);
        let mut classifier = GradientBoostedClassifier::new(small_config());
        classifier.fit(&features, &labels).unwrap();

        let bytes = bincode::serialize(&classifier).unwrap();
        let restored: GradientBoostedClassifier = bincode::deserialize(&bytes).unwrap();

        assert_eq!(
            restored.predict_proba(&features).unwrap(),
            classifier.predict_proba(&features).unwrap()
        );
    }

    #[test]
    fn test_predict_requires_training() {
        let (features, _) = separable(4);
        let classifier = GradientBoostedClassifier::new(small_config());
        assert!(classifier.predict(&features).is_err());
    }

    #[test]
    fn test_label_count_mismatch() {
        let (features, _) = separable(4);
        let mut classifier = GradientBoostedClassifier::new(small_config());
        assert!(matches!(
            classifier.fit(&features, &[0, 1]),
            Err(AppError::Schema(_))
        ));
    }
}
