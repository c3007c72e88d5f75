use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/ready", get(handlers::readiness))
        // Prediction
        .route(
            "/api/predict",
            post(handlers::predict)
                .options(handlers::predict_options)
                .fallback(handlers::method_not_allowed),
        )
        // Model registry
        .route("/api/models", get(handlers::list_models))
        .route("/api/models/active", get(handlers::active_model))
        .route("/api/models/reload", post(handlers::reload_model))
        // Prometheus
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
