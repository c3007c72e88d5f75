use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use url_sentinel::{
    artifacts::create_artifact_store,
    config::Config,
    ml::TrainingService,
    models::CorpusRow,
    state::{create_stores, CorpusCollection, CorpusStore},
    telemetry::init_tracing,
    AppError, Result,
};

#[derive(Parser)]
#[command(name = "url-sentinel-trainer", version)]
#[command(about = "Train, evaluate and publish URL classification pipelines", long_about = None)]
struct Args {
    /// Configuration file (defaults to the embedded configuration)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<String>,

    /// Run a single training pass and exit
    #[arg(long)]
    once: bool,

    /// Append JSON-lines rows to the train corpus before training
    #[arg(long, value_name = "FILE")]
    import_train: Option<PathBuf>,

    /// Append JSON-lines rows to the test corpus before training
    #[arg(long, value_name = "FILE")]
    import_test: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Trainer exiting");
            eprintln!("url-sentinel-trainer: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    init_tracing(&config.observability);
    tracing::info!("Starting URL Sentinel trainer v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = url_sentinel::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let stores = create_stores(&config.state).await?;
    let artifacts = create_artifact_store(&config.artifacts).await?;

    if let Some(path) = &args.import_train {
        import_rows(stores.corpus.as_ref(), CorpusCollection::Train, path).await?;
    }
    if let Some(path) = &args.import_test {
        import_rows(stores.corpus.as_ref(), CorpusCollection::Test, path).await?;
    }

    let service = TrainingService::new(
        stores.registry,
        stores.corpus,
        artifacts,
        config.artifacts.container.clone(),
        config.training.pipeline(),
        config.training.interval(),
    );

    if args.once {
        let report = service.run_once().await?;
        tracing::info!(
            version_id = %report.model.version_id,
            f1_score = report.model.f1_score,
            true_positive = report.confusion.true_positive,
            false_positive = report.confusion.false_positive,
            false_negative = report.confusion.false_negative,
            true_negative = report.confusion.true_negative,
            "Training pass complete"
        );
        return Ok(());
    }

    tokio::select! {
        result = service.run_forever() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    }
}

/// Append every non-blank line of a JSON-lines file as a corpus row
async fn import_rows(
    corpus: &dyn CorpusStore,
    collection: CorpusCollection,
    path: &Path,
) -> Result<()> {
    let text = tokio::fs::read_to_string(path).await?;

    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: CorpusRow = serde_json::from_str(line).map_err(|e| {
            AppError::Validation(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        rows.push(row);
    }

    let written = corpus.insert_many(collection, &rows).await?;
    tracing::info!(
        collection = %collection,
        rows = written,
        file = %path.display(),
        "Imported corpus rows"
    );
    Ok(())
}
