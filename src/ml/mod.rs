/// Machine learning for URL classification
///
/// This module provides:
/// - Text normalization shared by training and serving
/// - Row-level preprocessing of stored corpora
/// - TF-IDF + k-means clustering of URL and page text
/// - Ordinal encoding and numeric passthrough
/// - Gradient-boosted trees with confusion-matrix evaluation
/// - Versioned pipeline artifacts and the periodic training loop

pub mod boosting;
pub mod encoding;
pub mod evaluation;
pub mod kmeans;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod text;
pub mod tfidf;
pub mod training;
pub mod transform;

pub use boosting::{Classifier, GradientBoostedClassifier};
pub use evaluation::{ConfusionMatrix, EvaluationError, EvaluationMetrics};
pub use models::{
    BoostingConfig, KMeansConfig, LabeledRow, ModelInput, PipelineConfig, TfidfConfig,
};
pub use pipeline::{ModelMetadata, UrlPipeline};
pub use preprocess::preprocess;
pub use text::{clean_page_text, normalize_content, normalize_url};
pub use training::{train, TrainingReport, TrainingService};
pub use transform::FeatureTransformer;
