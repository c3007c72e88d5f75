use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use url_sentinel::{
    api::{build_router, AppState},
    artifacts::create_artifact_store,
    config::Config,
    extraction::FeatureExtractor,
    ml::TrainingService,
    scheduler::{schedule_model_refresh, schedule_training, SchedulerService},
    serving::ServingRuntime,
    state::create_stores,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    init_tracing(&config.observability);
    tracing::info!("Starting URL Sentinel v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = url_sentinel::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    // Storage
    tracing::info!("Storage backend: {:?}", config.state.backend);
    let stores = create_stores(&config.state).await?;
    let artifacts = create_artifact_store(&config.artifacts).await?;
    tracing::info!("✅ Registry, corpus and artifact store initialized");

    let extractor = Arc::new(FeatureExtractor::new(config.extraction.clone())?);

    let runtime = Arc::new(ServingRuntime::new(
        stores.registry.clone(),
        stores.corpus.clone(),
        artifacts.clone(),
        extractor,
        config.artifacts.container.clone(),
        &config.serving,
    ));

    // Initial load; an empty registry is not fatal unless required
    match runtime.refresh().await {
        Ok(outcome) => tracing::info!(version_id = %outcome.version_id(), "✅ Model loaded"),
        Err(e) if config.serving.require_model_at_startup => {
            tracing::error!(error = %e, "No model could be loaded at startup");
            return Err(e.into());
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠️  Starting without a model");
            tracing::warn!("   The first prediction will retry the load");
        }
    }

    // Periodic refresh
    let mut scheduler = SchedulerService::new().await?;
    schedule_model_refresh(
        &scheduler,
        runtime.clone(),
        config.serving.refresh_interval(),
    )
    .await?;
    tracing::info!(
        every_secs = config.serving.refresh_interval_secs,
        "✅ Model refresh scheduled"
    );

    if config.training.embedded {
        let trainer = Arc::new(TrainingService::new(
            stores.registry.clone(),
            stores.corpus.clone(),
            artifacts,
            config.artifacts.container.clone(),
            config.training.pipeline(),
            config.training.interval(),
        ));
        schedule_training(
            &scheduler,
            trainer,
            runtime.clone(),
            config.training.interval(),
        )
        .await?;
        tracing::info!(
            every_secs = config.training.interval_secs,
            "✅ Embedded training scheduled"
        );
    }

    scheduler.start().await?;

    let app = build_router(AppState::new(runtime, stores.registry.clone()))
        .layer(TimeoutLayer::new(config.server.request_timeout()));

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Prediction: http://{}/api/predict", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    scheduler.shutdown().await?;
    Ok(())
}
