use crate::ml::models::{BoostingConfig, KMeansConfig, PipelineConfig, TfidfConfig};
use crate::models::Metric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Registry and corpus backend
    pub state: StateConfig,

    /// Model artifact backend
    pub artifacts: ArtifactConfig,

    /// Network lookups used to build feature records
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub serving: ServingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Embedded defaults, then `config_path` if it exists, then environment
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: URL_SENTINEL_)
            .add_source(
                config::Environment::with_prefix("URL_SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()
    }

    /// Reject settings that would only fail later at runtime
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.state.backend == StateBackend::Sled && self.state.path.is_none() {
            return Err(config::ConfigError::Message(
                "state.path is required for the sled backend".to_string(),
            ));
        }
        if self.artifacts.backend == ArtifactBackend::Filesystem && self.artifacts.path.is_none() {
            return Err(config::ConfigError::Message(
                "artifacts.path is required for the filesystem backend".to_string(),
            ));
        }
        if self.training.kmeans.n_clusters == 0 {
            return Err(config::ConfigError::Message(
                "training.kmeans.n_clusters must be at least 1".to_string(),
            ));
        }
        let (min_n, max_n) = self.training.tfidf.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(config::ConfigError::Message(format!(
                "training.tfidf.ngram_range ({}, {}) is invalid",
                min_n, max_n
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for the embedded database
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub backend: ArtifactBackend,

    /// Root directory; one subdirectory per container
    pub path: Option<PathBuf>,

    /// Container holding serialized pipelines
    #[serde(default = "default_container")]
    pub container: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactBackend {
    #[default]
    Filesystem,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout_ms: u64,

    #[serde(default = "default_whois_timeout")]
    pub whois_timeout_ms: u64,

    /// Page and external script fetches
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    #[serde(default = "default_geo_timeout")]
    pub geo_timeout_ms: u64,

    /// Queried as `{geo_endpoint}/{ip}`, must answer JSON with `country`
    #[serde(default = "default_geo_endpoint")]
    pub geo_endpoint: String,

    /// First WHOIS server asked; its `refer:` answer is followed
    #[serde(default = "default_whois_server")]
    pub whois_server: String,

    #[serde(default = "default_whois_port")]
    pub whois_port: u16,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// External `<script src>` fetches per page
    #[serde(default = "default_max_external_scripts")]
    pub max_external_scripts: usize,
}

impl ExtractionConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_millis(self.whois_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: default_dns_timeout(),
            whois_timeout_ms: default_whois_timeout(),
            http_timeout_ms: default_http_timeout(),
            geo_timeout_ms: default_geo_timeout(),
            geo_endpoint: default_geo_endpoint(),
            whois_server: default_whois_server(),
            whois_port: default_whois_port(),
            user_agent: default_user_agent(),
            max_external_scripts: default_max_external_scripts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Pause between training runs (seconds)
    #[serde(default = "default_training_interval")]
    pub interval_secs: u64,

    /// Run training as a scheduled job inside the server process
    #[serde(default)]
    pub embedded: bool,

    #[serde(default)]
    pub tfidf: TfidfConfig,

    #[serde(default)]
    pub kmeans: KMeansConfig,

    #[serde(default)]
    pub boosting: BoostingConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_training_interval(),
            embedded: false,
            tfidf: TfidfConfig::default(),
            kmeans: KMeansConfig::default(),
            boosting: BoostingConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            tfidf: self.tfidf.clone(),
            kmeans: self.kmeans.clone(),
            boosting: self.boosting.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Active pipeline refresh period (seconds)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Registry metric the active pipeline is chosen by
    #[serde(default)]
    pub selection_metric: Metric,

    /// Fail startup when no model can be loaded
    #[serde(default)]
    pub require_model_at_startup: bool,
}

impl ServingConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            selection_metric: Metric::default(),
            require_model_at_startup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

fn default_container() -> String {
    "models".to_string()
}

fn default_dns_timeout() -> u64 {
    3_000
}

fn default_whois_timeout() -> u64 {
    5_000
}

fn default_http_timeout() -> u64 {
    10_000
}

fn default_geo_timeout() -> u64 {
    3_000
}

fn default_geo_endpoint() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_whois_server() -> String {
    "whois.iana.org".to_string()
}

fn default_whois_port() -> u16 {
    43
}

fn default_user_agent() -> String {
    format!("url-sentinel/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_external_scripts() -> usize {
    20
}

fn default_training_interval() -> u64 {
    86_400 // 24 hours
}

fn default_refresh_interval() -> u64 {
    86_400
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "url-sentinel".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_whois_port(), 43);
        assert_eq!(default_training_interval(), 86_400);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::embedded().unwrap();

        assert_eq!(config.state.backend, StateBackend::Sled);
        assert_eq!(config.artifacts.container, "models");
        assert_eq!(config.serving.selection_metric, Metric::F1Score);
        assert_eq!(config.training.pipeline(), PipelineConfig::default());
        assert!(!config.training.embedded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_paths() {
        let mut config = Config::embedded().unwrap();
        config.state.path = None;
        assert!(config.validate().is_err());

        config.state.backend = StateBackend::Memory;
        assert!(config.validate().is_ok());

        config.artifacts.path = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_ngram_range() {
        let mut config = Config::embedded().unwrap();
        config.training.tfidf.ngram_range = (2, 1);
        assert!(config.validate().is_err());
    }
}
