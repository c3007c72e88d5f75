use crate::error::{AppError, Result};
use crate::ml::models::TfidfConfig;
use crate::ml::text::is_stopword;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// L2-normalized sparse TF-IDF row: (term index, weight), sorted by index
pub type SparseVector = Vec<(usize, f64)>;

/// TF-IDF vectorizer over a fixed vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: TfidfConfig,

    /// Vocabulary mapping (term -> index)
    vocabulary: HashMap<String, usize>,

    /// Inverse document frequency, indexed like the vocabulary
    idf: Vec<f64>,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl TfidfVectorizer {
    pub fn new(config: TfidfConfig) -> Self {
        Self {
            config,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            is_fitted: false,
        }
    }

    /// Build the vocabulary and idf weights from a set of documents.
    ///
    /// An empty vocabulary after document-frequency filtering is allowed;
    /// every document then transforms to an empty vector.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        let n_docs = documents.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.extract_terms(doc.as_ref());
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_freq.entry(term).or_insert(0) += 1;
            }
        }

        let max_doc_count = self.config.max_df * n_docs as f64;
        let mut kept: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= self.config.min_df && (*df as f64) <= max_doc_count)
            .collect();

        // Most frequent terms first, alphabetical among equals
        if kept.len() > self.config.max_features {
            kept.sort_by(|a, b| {
                let fa = term_freq.get(&a.0).copied().unwrap_or(0);
                let fb = term_freq.get(&b.0).copied().unwrap_or(0);
                fb.cmp(&fa).then_with(|| a.0.cmp(&b.0))
            });
            kept.truncate(self.config.max_features);
        }

        // Indices follow term order
        let ordered: BTreeMap<String, usize> = kept.into_iter().collect();

        self.vocabulary = HashMap::with_capacity(ordered.len());
        self.idf = Vec::with_capacity(ordered.len());
        for (idx, (term, df)) in ordered.into_iter().enumerate() {
            // Smoothed idf
            let idf = ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0;
            self.idf.push(idf);
            self.vocabulary.insert(term, idx);
        }

        self.is_fitted = true;
        Ok(())
    }

    /// Transform one document into a sparse, L2-normalized TF-IDF vector
    pub fn transform_one(&self, document: &str) -> Result<SparseVector> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "TfidfVectorizer must be fitted before transform".to_string(),
            ));
        }

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.extract_terms(document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() {
                *w /= norm;
            }
        }

        Ok(row)
    }

    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vec<SparseVector>> {
        documents
            .iter()
            .map(|doc| self.transform_one(doc.as_ref()))
            .collect()
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Vec<SparseVector>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    /// Tokenize, drop stopwords, and generate n-grams
    fn extract_terms(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = TOKEN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| !self.config.remove_stopwords || !is_stopword(w))
            .collect();

        let (min_n, max_n) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            for window in words.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }

    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
