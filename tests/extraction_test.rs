use std::net::TcpListener;
use url_sentinel::{
    config::ExtractionConfig,
    extraction::{FeatureExtractor, UrlFeatureSource, UNKNOWN_GEO},
    models::{Https, WhoIs},
};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Welcome!</title>
  <script>var first = 1;
var second = 2;</script>
  <script src="/static/app.js"></script>
  <script src="/static/missing.js"></script>
</head>
<body>
  <h1>Hello, World!</h1>
  <p>The quick brown fox jumps over the lazy dog.</p>
</body>
</html>"#;

/// A local port with nothing listening on it
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn config(geo_endpoint: String) -> ExtractionConfig {
    ExtractionConfig {
        dns_timeout_ms: 500,
        whois_timeout_ms: 500,
        http_timeout_ms: 2000,
        geo_timeout_ms: 1000,
        geo_endpoint,
        whois_server: "127.0.0.1".to_string(),
        whois_port: closed_port(),
        ..ExtractionConfig::default()
    }
}

#[tokio::test]
async fn test_extract_page_signals() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/page")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(PAGE)
        .create_async()
        .await;
    let script = server
        .mock("GET", "/static/app.js")
        .with_status(200)
        .with_body("one();\ntwo();\nthree();")
        .create_async()
        .await;
    server
        .mock("GET", "/static/missing.js")
        .with_status(404)
        .create_async()
        .await;

    let extractor = FeatureExtractor::new(config(format!("{}/json", server.url()))).unwrap();
    let url = format!("{}/page", server.url());

    let record = extractor.extract(&url).await;

    page.assert_async().await;
    script.assert_async().await;

    assert_eq!(record.url, url);
    assert_eq!(record.url_len, url.chars().count() as u64);
    assert_eq!(record.https, Https::No);
    assert_eq!(record.tld, "1");
    assert_eq!(record.who_is, WhoIs::Incomplete);
    assert_eq!(record.js_obf_len, 0);
    assert!(record.label.is_none());

    // 2 inline lines + 3 external lines; the 404 script adds nothing
    assert_eq!(record.js_len, 5);

    assert!(record.content.contains("hello world"));
    assert!(record.content.contains("quick brown fox jumps lazy dog"));
    assert!(!record.content.contains('!'));
    assert!(!record.content.split(' ').any(|token| token == "the"));
}

#[tokio::test]
async fn test_non_success_page_keeps_content_but_no_scripts() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/gone")
        .with_status(404)
        .with_header("content-type", "text/html")
        .with_body("<html><body><script>x()</script>Page Not Found</body></html>")
        .create_async()
        .await;

    let extractor = FeatureExtractor::new(config(format!("{}/json", server.url()))).unwrap();
    let record = extractor.extract(&format!("{}/gone", server.url())).await;

    assert_eq!(record.js_len, 0);
    assert!(record.content.contains("page found"));
}

#[tokio::test]
async fn test_geo_location() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/json/8.8.8.8")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"success","country":"United States","query":"8.8.8.8"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/json/10.0.0.1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"fail","message":"private range"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/json/1.1.1.1")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let extractor = FeatureExtractor::new(config(format!("{}/json/", server.url()))).unwrap();

    assert_eq!(extractor.geo_location("8.8.8.8").await, "United States");
    assert_eq!(extractor.geo_location("10.0.0.1").await, UNKNOWN_GEO);
    assert_eq!(extractor.geo_location("1.1.1.1").await, UNKNOWN_GEO);
    assert_eq!(extractor.geo_location("").await, UNKNOWN_GEO);
}

#[tokio::test]
async fn test_resolve_ip_literal() {
    let extractor = FeatureExtractor::new(config("http://127.0.0.1:9".to_string())).unwrap();

    assert_eq!(extractor.resolve_address("http://127.0.0.1/").await, "127.0.0.1");
    // Anything after the host makes the name unresolvable
    assert_eq!(extractor.resolve_address("http://127.0.0.1/path").await, "");
}

#[tokio::test]
async fn test_unreachable_host_never_fails() {
    let geo_endpoint = format!("http://127.0.0.1:{}", closed_port());
    let extractor = FeatureExtractor::new(config(geo_endpoint)).unwrap();

    let record = extractor.extract("http://unreachable.invalid/").await;

    assert_eq!(record.ip_address, "");
    assert_eq!(record.geo_loc, UNKNOWN_GEO);
    assert_eq!(record.js_len, 0);
    assert_eq!(record.content, "");
    assert_eq!(record.who_is, WhoIs::Incomplete);
    assert_eq!(record.tld, "invalid");
    assert_eq!(record.url_len, 27);
}

#[tokio::test]
async fn test_unparsable_url() {
    let extractor = FeatureExtractor::new(config("http://127.0.0.1:9".to_string())).unwrap();

    let record = extractor.extract("not a url").await;

    assert_eq!(record.url_len, 9);
    assert_eq!(record.tld, "");
    assert_eq!(record.https, Https::No);
    assert_eq!(record.ip_address, "");
    assert_eq!(record.content, "");
}
