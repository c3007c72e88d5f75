use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use url_sentinel::config::Config;
use url_sentinel::extraction::{FeatureExtractor, UrlFeatureSource};

#[derive(Parser)]
#[command(name = "url-sentinel-cli", version)]
#[command(about = "URL Sentinel CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "URL_SENTINEL_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a URL on the server
    Predict {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Extract the feature record of a URL locally, without a server
    Extract {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// List registered models
    Models,

    /// Show the model the server is serving
    Active,

    /// Ask the server to load the best registered model now
    Reload,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Predict { url } => {
            let response = client
                .post(format!("{}/api/predict", cli.endpoint))
                .json(&json!({ "url": url }))
                .send()
                .await
                .context("Prediction request failed")?;
            print_json(response).await?;
        }

        Commands::Extract { url } => {
            let config = Config::load().context("Failed to load configuration")?;
            let extractor = FeatureExtractor::new(config.extraction)?;
            let record = extractor.extract(&url).await;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Models => {
            let response = client
                .get(format!("{}/api/models", cli.endpoint))
                .send()
                .await
                .context("Model listing request failed")?;
            print_json(response).await?;
        }

        Commands::Active => {
            let response = client
                .get(format!("{}/api/models/active", cli.endpoint))
                .send()
                .await
                .context("Active model request failed")?;
            print_json(response).await?;
        }

        Commands::Reload => {
            let response = client
                .post(format!("{}/api/models/reload", cli.endpoint))
                .send()
                .await
                .context("Reload request failed")?;
            print_json(response).await?;
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await
                .context("Health request failed")?;

            if response.status().is_success() {
                println!("✓ Server is healthy");
                print_json(response).await?;
            } else {
                bail!("Server is unhealthy: {}", response.status());
            }
        }
    }

    Ok(())
}

/// Pretty-print a JSON body, failing on a non-2xx status
async fn print_json(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Server did not answer JSON")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("Server answered {}", status);
    }
    Ok(())
}
