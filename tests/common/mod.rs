//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url_sentinel::artifacts::{ArtifactStore, InMemoryArtifactStore};
use url_sentinel::extraction::UrlFeatureSource;
use url_sentinel::ml::{
    BoostingConfig, ConfusionMatrix, EvaluationMetrics, KMeansConfig, PipelineConfig,
    TfidfConfig, TrainingService,
};
use url_sentinel::models::{CorpusRow, FeatureRecord, Https, RawLabel, TrainedModel, WhoIs};
use url_sentinel::state::{CorpusCollection, CorpusStore, InMemoryStore};

/// Pipeline parameters small enough for a handful of rows
pub fn small_config() -> PipelineConfig {
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

/// Corpus document shaped like a stored row; `bad` rows look like phishing
pub fn corpus_row(url: &str, content: &str, label: &str) -> CorpusRow {
    let bad = label == "bad";
    CorpusRow {
        id: None,
        url: Some(url.to_string()),
        url_len: Some(url.len() as u64),
        ip_address: Some(String::new()),
        geo_loc: Some(if bad { "Unknown" } else { "Germany" }.to_string()),
        tld: Some(if bad { "xyz" } else { "com" }.to_string()),
        who_is: Some(if bad { "incomplete" } else { "complete" }.to_string()),
        https: Some(if bad { "no" } else { "yes" }.to_string()),
        js_len: Some(if bad { 4 } else { 180 }),
        js_obf_len: Some(0),
        content: Some(content.to_string()),
        label: Some(RawLabel::Text(label.to_string())),
        extra: Default::default(),
    }
}

pub fn train_rows() -> Vec<CorpusRow> {
    vec![
        corpus_row("https://www.garden.com/tools", "garden tools seeds", "good"),
        corpus_row("https://www.travel.com/trips", "travel trips hotels", "good"),
        corpus_row("https://www.recipes.com/soup", "recipes soup dinner", "good"),
        corpus_row("http://login-verify.xyz/", "verify login password", "bad"),
        corpus_row("http://account-lock.xyz/", "account locked password", "bad"),
        corpus_row("http://gift-card.xyz/win", "gift card winner password", "bad"),
    ]
}

pub fn test_rows() -> Vec<CorpusRow> {
    vec![
        corpus_row("https://www.movies.com/new", "movies cinema tickets", "good"),
        corpus_row("https://www.sports.com/live", "sports scores live", "good"),
        corpus_row("http://update-bank.xyz/", "bank update password", "bad"),
        corpus_row("http://reset-now.xyz/", "reset password urgent", "bad"),
    ]
}

pub async fn seed_corpus(store: &dyn CorpusStore) {
    store
        .insert_many(CorpusCollection::Train, &train_rows())
        .await
        .unwrap();
    store
        .insert_many(CorpusCollection::Test, &test_rows())
        .await
        .unwrap();
}

/// Train and publish one model into the given stores
pub async fn publish_model(
    store: &InMemoryStore,
    artifacts: &InMemoryArtifactStore,
) -> TrainedModel {
    if store.count(CorpusCollection::Test).await.unwrap() == 0 {
        seed_corpus(store).await;
    }

    let service = TrainingService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(artifacts.clone()) as Arc<dyn ArtifactStore>,
        "models",
        small_config(),
        Duration::from_secs(3600),
    );
    service.run_once().await.unwrap().model
}

/// Registry entry with a chosen f1 score
pub fn registry_entry(version_id: &str, f1_score: f64) -> TrainedModel {
    let confusion = ConfusionMatrix {
        true_negative: 9,
        false_positive: 2,
        false_negative: 1,
        true_positive: 8,
    };
    let metrics = EvaluationMetrics::from_confusion(&confusion).unwrap();
    let mut model = TrainedModel::new(version_id, &metrics);
    model.f1_score = f1_score;
    model
}

/// Feature source that answers without touching the network
pub struct StubSource;

#[async_trait]
impl UrlFeatureSource for StubSource {
    async fn extract(&self, url: &str) -> FeatureRecord {
        FeatureRecord {
            url: url.to_string(),
            url_len: url.chars().count() as u64,
            ip_address: "93.184.216.34".to_string(),
            geo_loc: "Unknown".to_string(),
            tld: "xyz".to_string(),
            who_is: WhoIs::Incomplete,
            https: Https::No,
            js_len: 4,
            js_obf_len: 0,
            content: "verify password urgent".to_string(),
            label: None,
        }
    }
}

/// Parse Prometheus text exposition into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
