use crate::error::{AppError, Result};
use crate::ml::encoding::OrdinalEncoder;
use crate::ml::kmeans::MiniBatchKMeans;
use crate::ml::models::{ModelInput, PipelineConfig};
use crate::ml::tfidf::TfidfVectorizer;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Columns of every transformed row, in order
pub const FEATURE_COLUMNS: [&str; 8] = [
    "content_cluster",
    "url_cluster",
    "geo_loc",
    "tld",
    "who_is",
    "https",
    "js_len",
    "url_len",
];

/// TF-IDF followed by k-means: one cluster id per document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextClusterer {
    vectorizer: TfidfVectorizer,
    kmeans: MiniBatchKMeans,
}

impl TextClusterer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            vectorizer: TfidfVectorizer::new(config.tfidf.clone()),
            kmeans: MiniBatchKMeans::new(config.kmeans.clone()),
        }
    }

    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        let rows = self.vectorizer.fit_transform(documents)?;
        self.kmeans.fit(&rows, self.vectorizer.vocab_size())
    }

    pub fn predict(&self, document: &str) -> Result<usize> {
        let row = self.vectorizer.transform_one(document)?;
        self.kmeans.predict_one(&row)
    }

    pub fn vocab_size(&self) -> usize {
        self.vectorizer.vocab_size()
    }
}

/// Column-wise transformation from `ModelInput` rows to a dense matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTransformer {
    content: TextClusterer,
    url: TextClusterer,
    geo_loc: OrdinalEncoder,
    tld: OrdinalEncoder,
    who_is: OrdinalEncoder,
    https: OrdinalEncoder,
    is_fitted: bool,
}

impl FeatureTransformer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            content: TextClusterer::new(config),
            url: TextClusterer::new(config),
            geo_loc: OrdinalEncoder::new(),
            tld: OrdinalEncoder::new(),
            who_is: OrdinalEncoder::new(),
            https: OrdinalEncoder::new(),
            is_fitted: false,
        }
    }

    /// Fit every column transformer on the training rows
    pub fn fit(&mut self, rows: &[ModelInput]) -> Result<()> {
        if rows.is_empty() {
            return Err(AppError::Preprocessing(
                "Cannot fit feature transformer on an empty dataset".to_string(),
            ));
        }

        let contents: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
        let urls: Vec<&str> = rows.iter().map(|r| r.url.as_str()).collect();

        self.content.fit(&contents)?;
        self.url.fit(&urls)?;

        self.geo_loc.fit(&rows.iter().map(|r| r.geo_loc.as_str()).collect::<Vec<_>>());
        self.tld.fit(&rows.iter().map(|r| r.tld.as_str()).collect::<Vec<_>>());
        self.who_is.fit(&rows.iter().map(|r| r.who_is.as_str()).collect::<Vec<_>>());
        self.https.fit(&rows.iter().map(|r| r.https.as_str()).collect::<Vec<_>>());

        self.is_fitted = true;

        info!(
            rows = rows.len(),
            content_vocab = self.content.vocab_size(),
            url_vocab = self.url.vocab_size(),
            "Feature transformer fitted"
        );

        Ok(())
    }

    /// Transform rows into a dense `rows × n_features` matrix
    pub fn transform(&self, rows: &[ModelInput]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "FeatureTransformer must be fitted before transform".to_string(),
            ));
        }

        let n_features = self.n_features();
        let mut data = Vec::with_capacity(rows.len() * n_features);

        for row in rows {
            data.push(self.content.predict(&row.content)? as f64);
            data.push(self.url.predict(&row.url)? as f64);
            data.push(self.geo_loc.encode(&row.geo_loc)?);
            data.push(self.tld.encode(&row.tld)?);
            data.push(self.who_is.encode(&row.who_is)?);
            data.push(self.https.encode(&row.https)?);
            data.push(row.js_len as f64);
            data.push(row.url_len as f64);
        }

        Array2::from_shape_vec((rows.len(), n_features), data)
            .map_err(|e| AppError::Internal(format!("Failed to shape feature matrix: {}", e)))
    }

    pub fn fit_transform(&mut self, rows: &[ModelInput]) -> Result<Array2<f64>> {
        self.fit(rows)?;
        self.transform(rows)
    }

    /// Output column names in order
    pub fn feature_names(&self) -> Vec<String> {
        FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    pub fn n_features(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
