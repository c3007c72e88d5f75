//! Feature extraction: a raw URL becomes a [`FeatureRecord`].
//!
//! Extraction never fails. Each lookup is bounded by its own timeout from
//! [`ExtractionConfig`] and falls back to a fixed default, reporting an
//! `ok`/`timeout`/`error` outcome to tracing and to
//! `url_sentinel_extraction_lookups_total`.

pub mod page;
pub mod whois;

use crate::config::ExtractionConfig;
use crate::error::{AppError, Result};
use crate::metrics::EXTRACTION_LOOKUPS_TOTAL;
use crate::ml::text::clean_page_text;
use crate::models::{FeatureRecord, Https, WhoIs};
use async_trait::async_trait;
use futures::future::join_all;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::debug;
use url::Url;

/// Geo location reported when the country is not known
pub const UNKNOWN_GEO: &str = "Unknown";

/// Produces the feature record of a URL
#[async_trait]
pub trait UrlFeatureSource: Send + Sync {
    async fn extract(&self, url: &str) -> FeatureRecord;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Timeout,
    Error,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Timeout => "timeout",
            Outcome::Error => "error",
        }
    }

    fn of_request(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Outcome::Timeout
        } else {
            Outcome::Error
        }
    }
}

fn report(lookup: &'static str, outcome: Outcome, started: Instant) {
    EXTRACTION_LOOKUPS_TOTAL
        .with_label_values(&[lookup, outcome.as_str()])
        .inc();
    debug!(
        lookup,
        outcome = outcome.as_str(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Lookup finished"
    );
}

/// Page body fetched once per extraction
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub success: bool,
    pub body: String,
}

/// Network-backed feature extractor
#[derive(Clone)]
pub struct FeatureExtractor {
    config: ExtractionConfig,
    client: reqwest::Client,
}

impl FeatureExtractor {
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.http_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Resolve the URL (scheme and one trailing `/` removed) as a host name.
    ///
    /// The first IPv4 address wins, else the first address; `""` on failure.
    pub async fn resolve_address(&self, url: &str) -> String {
        let started = Instant::now();
        let host = host_for_resolution(url);
        if host.is_empty() {
            report("dns", Outcome::Error, started);
            return String::new();
        }

        let lookup = tokio::net::lookup_host((host, 80));
        match tokio::time::timeout(self.config.dns_timeout(), lookup).await {
            Ok(Ok(addrs)) => {
                let addrs: Vec<SocketAddr> = addrs.collect();
                let chosen = addrs
                    .iter()
                    .find(|addr| addr.is_ipv4())
                    .or_else(|| addrs.first())
                    .map(|addr| addr.ip().to_string());
                match chosen {
                    Some(ip) => {
                        report("dns", Outcome::Ok, started);
                        ip
                    }
                    None => {
                        report("dns", Outcome::Error, started);
                        String::new()
                    }
                }
            }
            Ok(Err(e)) => {
                debug!(host, error = %e, "Address resolution failed");
                report("dns", Outcome::Error, started);
                String::new()
            }
            Err(_) => {
                report("dns", Outcome::Timeout, started);
                String::new()
            }
        }
    }

    /// `complete` when a WHOIS server returns a registration record
    pub async fn whois_status(&self, url: &str) -> WhoIs {
        let started = Instant::now();
        let domain = match whois_domain(url) {
            Some(domain) => domain,
            None => {
                report("whois", Outcome::Error, started);
                return WhoIs::Incomplete;
            }
        };

        let answer = whois::lookup(
            &self.config.whois_server,
            self.config.whois_port,
            &domain,
            self.config.whois_timeout(),
        )
        .await;

        match answer {
            Ok(answer) if whois::is_complete(&answer) => {
                report("whois", Outcome::Ok, started);
                WhoIs::Complete
            }
            Ok(_) => {
                debug!(domain, "WHOIS answer holds no record");
                report("whois", Outcome::Ok, started);
                WhoIs::Incomplete
            }
            Err(whois::WhoisError::Timeout) => {
                report("whois", Outcome::Timeout, started);
                WhoIs::Incomplete
            }
            Err(whois::WhoisError::Io(e)) => {
                debug!(domain, error = %e, "WHOIS lookup failed");
                report("whois", Outcome::Error, started);
                WhoIs::Incomplete
            }
        }
    }

    /// Fetch the page body whatever the status; `None` on transport failure
    pub async fn fetch_page(&self, url: &str) -> Option<FetchedPage> {
        let started = Instant::now();
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => {
                report("page", Outcome::Error, started);
                return None;
            }
        };

        match self.fetch_document(parsed).await {
            Ok(page) => {
                report("page", Outcome::Ok, started);
                Some(page)
            }
            Err(e) => {
                debug!(url, error = %e, "Page fetch failed");
                report("page", Outcome::of_request(&e), started);
                None
            }
        }
    }

    /// Inline script lines plus lines of every external script that loads.
    ///
    /// Zero unless the page itself answered 2xx.
    pub async fn script_volume(&self, fetched: &FetchedPage) -> u64 {
        if !fetched.success {
            return 0;
        }

        let scan = page::scan_scripts(&fetched.body, self.config.max_external_scripts);
        let external = join_all(
            scan.sources
                .iter()
                .map(|src| self.script_lines(&fetched.url, src)),
        );

        scan.inline_lines + external.await.into_iter().sum::<u64>()
    }

    async fn script_lines(&self, base: &Url, src: &str) -> u64 {
        let started = Instant::now();
        let script_url = match base.join(src) {
            Ok(script_url) => script_url,
            Err(_) => {
                report("script", Outcome::Error, started);
                return 0;
            }
        };

        match self.fetch_script(script_url).await {
            Ok(Some(body)) => {
                report("script", Outcome::Ok, started);
                page::line_count(&body)
            }
            Ok(None) => {
                report("script", Outcome::Error, started);
                0
            }
            Err(e) => {
                report("script", Outcome::of_request(&e), started);
                0
            }
        }
    }

    /// Country of an address from the geo endpoint, `Unknown` otherwise
    pub async fn geo_location(&self, ip: &str) -> String {
        if ip.is_empty() {
            return UNKNOWN_GEO.to_string();
        }

        let started = Instant::now();
        let endpoint = format!("{}/{}", self.config.geo_endpoint.trim_end_matches('/'), ip);

        match self.fetch_geo(&endpoint).await {
            Ok(body) => {
                report("geo", Outcome::Ok, started);
                body.get("country")
                    .and_then(|country| country.as_str())
                    .filter(|country| !country.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| UNKNOWN_GEO.to_string())
            }
            Err(e) => {
                debug!(ip, error = %e, "Geo lookup failed");
                report("geo", Outcome::of_request(&e), started);
                UNKNOWN_GEO.to_string()
            }
        }
    }
}

impl FeatureExtractor {
    async fn fetch_document(&self, url: Url) -> reqwest::Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.http_timeout())
            .send()
            .await?;
        let success = response.status().is_success();
        let url = response.url().clone();
        let body = response.text().await?;
        Ok(FetchedPage { url, success, body })
    }

    /// Script body, `None` for a non-2xx answer
    async fn fetch_script(&self, url: Url) -> reqwest::Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.http_timeout())
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        response.text().await.map(Some)
    }

    async fn fetch_geo(&self, endpoint: &str) -> reqwest::Result<serde_json::Value> {
        self.client
            .get(endpoint)
            .timeout(self.config.geo_timeout())
            .send()
            .await?
            .json::<serde_json::Value>()
            .await
    }
}

#[async_trait]
impl UrlFeatureSource for FeatureExtractor {
    async fn extract(&self, url: &str) -> FeatureRecord {
        let started = Instant::now();

        let (ip_address, who_is, fetched) = tokio::join!(
            self.resolve_address(url),
            self.whois_status(url),
            self.fetch_page(url),
        );

        let (js_len, geo_loc) = match &fetched {
            Some(fetched) => {
                tokio::join!(self.script_volume(fetched), self.geo_location(&ip_address))
            }
            None => (0, self.geo_location(&ip_address).await),
        };

        let content = fetched
            .map(|fetched| clean_page_text(&page::document_text(&fetched.body)))
            .unwrap_or_default();

        let record = FeatureRecord {
            url: url.to_string(),
            url_len: url.chars().count() as u64,
            ip_address,
            geo_loc,
            tld: top_level_domain(url),
            who_is,
            https: https_flag(url),
            js_len,
            js_obf_len: 0,
            content,
            label: None,
        };

        debug!(
            url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            js_len = record.js_len,
            "Features extracted"
        );
        record
    }
}

/// `http://`/`https://` prefix and one trailing `/` removed
pub fn host_for_resolution(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.strip_suffix('/').unwrap_or(rest)
}

/// Last dot-separated label of the host, `""` when the URL has none
pub fn top_level_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .and_then(|host| host.rsplit('.').next().map(str::to_string))
        .unwrap_or_default()
}

pub fn https_flag(url: &str) -> Https {
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "https" => Https::Yes,
        _ => Https::No,
    }
}

/// Registrable name asked of WHOIS: the host without a leading `www.`
fn whois_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let domain = host.strip_prefix("www.").unwrap_or(&host);
    (!domain.is_empty()).then(|| domain.to_string())
}
