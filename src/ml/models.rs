use crate::ml::text::{normalize_content, normalize_url};
use crate::models::{CorpusRow, FeatureRecord, RawLabel};
use serde::{Deserialize, Serialize};

/// TF-IDF vectorizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfidfConfig {
    /// Minimum number of documents a term must appear in
    pub min_df: usize,

    /// Maximum fraction of documents a term may appear in
    pub max_df: f64,

    /// N-gram range (min, max)
    pub ngram_range: (usize, usize),

    /// Vocabulary cap, most frequent terms first
    pub max_features: usize,

    /// Drop English stopwords before building n-grams
    pub remove_stopwords: bool,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            min_df: 5,
            max_df: 0.95,
            ngram_range: (1, 2), // Unigrams and bigrams
            max_features: 100_000,
            remove_stopwords: true,
        }
    }
}

/// Mini-batch k-means configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub n_clusters: usize,

    /// Rows sampled for k-means++ seeding
    pub init_size: usize,

    pub batch_size: usize,

    /// Upper bound on passes over the data, counted in batches
    pub max_epochs: usize,

    /// Stop once a batch update moves the centroids less than this
    pub tolerance: f64,

    pub random_state: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            init_size: 2048,
            batch_size: 4096,
            max_epochs: 100,
            tolerance: 1e-6,
            random_state: 20,
        }
    }
}

/// Gradient boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_samples_leaf: 1,
        }
    }
}

/// Transformation + classifier configuration fitted as one pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub tfidf: TfidfConfig,

    #[serde(default)]
    pub kmeans: KMeansConfig,

    #[serde(default)]
    pub boosting: BoostingConfig,
}

/// One row in the exact shape the feature pipeline consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    /// Normalized URL tokens
    pub url: String,
    pub url_len: u64,
    pub geo_loc: String,
    pub tld: String,
    pub who_is: String,
    pub https: String,
    pub js_len: u64,
    /// Normalized page content
    pub content: String,
}

impl ModelInput {
    /// Build a row, normalizing `url` and `content`.
    ///
    /// This is the only way rows are built for both fitting and inference.
    #[allow(clippy::too_many_arguments)]
    pub fn normalized(
        url: &str,
        url_len: u64,
        geo_loc: &str,
        tld: &str,
        who_is: &str,
        https: &str,
        js_len: u64,
        content: &str,
    ) -> Self {
        Self {
            url: normalize_url(url),
            url_len,
            geo_loc: geo_loc.to_string(),
            tld: tld.to_string(),
            who_is: who_is.to_string(),
            https: https.to_string(),
            js_len,
            content: normalize_content(content),
        }
    }

    /// Single inference row for a freshly extracted record
    pub fn from_record(record: &FeatureRecord) -> Self {
        Self::normalized(
            &record.url,
            record.url_len,
            &record.geo_loc,
            &record.tld,
            record.who_is.as_str(),
            record.https.as_str(),
            record.js_len,
            &record.content,
        )
    }
}

/// A preprocessed training row with its binary class (0 = good, 1 = bad)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub input: ModelInput,
    pub label: u8,
}

impl From<LabeledRow> for CorpusRow {
    fn from(row: LabeledRow) -> Self {
        let ModelInput {
            url,
            url_len,
            geo_loc,
            tld,
            who_is,
            https,
            js_len,
            content,
        } = row.input;

        Self {
            id: None,
            url: Some(url),
            url_len: Some(url_len),
            ip_address: None,
            geo_loc: Some(geo_loc),
            tld: Some(tld),
            who_is: Some(who_is),
            https: Some(https),
            js_len: Some(js_len),
            js_obf_len: None,
            content: Some(content),
            label: Some(RawLabel::Encoded(row.label)),
            extra: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Https, WhoIs};

    #[test]
    fn test_from_record_normalizes_text_fields() {
        let record = FeatureRecord {
            url: "https://www.Example.com/login".to_string(),
            url_len: 29,
            ip_address: String::new(),
            geo_loc: "Unknown".to_string(),
            tld: "com".to_string(),
            who_is: WhoIs::Incomplete,
            https: Https::Yes,
            js_len: 0,
            js_obf_len: 0,
            content: "The login page for the Example service".to_string(),
            label: None,
        };

        let input = ModelInput::from_record(&record);
        assert_eq!(input.url, "Example com login");
        assert_eq!(input.content, "the login page example service");
        assert_eq!(input.who_is, "incomplete");
        assert_eq!(input.https, "yes");
        assert_eq!(input.url_len, 29);
    }

    #[test]
    fn test_default_configs() {
        let config = PipelineConfig::default();
        assert_eq!(config.tfidf.min_df, 5);
        assert_eq!(config.tfidf.ngram_range, (1, 2));
        assert_eq!(config.kmeans.n_clusters, 4);
        assert_eq!(config.kmeans.random_state, 20);
        assert_eq!(config.boosting.max_depth, 6);
    }
}
