use crate::api::AppState;
use crate::error::Result;
use crate::metrics::gather_metrics;
use crate::models::{Label, TrainedModel};
use crate::serving::{LoadOutcome, RuntimeState, RuntimeStatus};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Ready once a pipeline is loaded
pub async fn readiness(State(state): State<AppState>) -> Response {
    let status = state.runtime.status();
    let code = match status.state {
        RuntimeState::Ready => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = json!({
        "status": status.state,
        "version_id": status.model.map(|m| m.version_id),
    });
    (code, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// `good` or `malicious`
    pub prediction: String,

    /// Winning class probability as a percentage
    pub proba: String,
}

/// Classify a URL
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Response> {
    let url = match payload {
        Ok(Json(PredictRequest { url: Some(url) })) if !url.trim().is_empty() => url,
        Ok(_) => return Ok(url_required()),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable prediction request");
            return Ok(url_required());
        }
    };

    let outcome = state.runtime.predict(&url).await?;

    let prediction = match outcome.label {
        Label::Good => "good",
        Label::Bad => "malicious",
    };
    Ok(Json(PredictResponse {
        prediction: prediction.to_string(),
        proba: format_proba(outcome.probability),
    })
    .into_response())
}

pub async fn predict_options() -> Json<serde_json::Value> {
    Json(json!({ "message": "success" }))
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method Not Allowed" })),
    )
        .into_response()
}

fn url_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "URL is required" })),
    )
        .into_response()
}

/// Probability as a percentage rounded to two decimals, always with a
/// fractional part (`100.0`, `87.5`, `66.67`)
pub fn format_proba(probability: f64) -> String {
    let percent = (probability * 10_000.0).round() / 100.0;
    let text = percent.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Every registered model in insertion order
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<TrainedModel>>> {
    Ok(Json(state.registry.list_models().await?))
}

pub async fn active_model(State(state): State<AppState>) -> Json<RuntimeStatus> {
    Json(state.runtime.status())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// `loaded` or `unchanged`
    pub outcome: String,
    pub version_id: String,
}

/// Refresh the active pipeline now
pub async fn reload_model(State(state): State<AppState>) -> Result<Json<ReloadResponse>> {
    let response = match state.runtime.refresh().await? {
        LoadOutcome::Loaded { version_id } => ReloadResponse {
            outcome: "loaded".to_string(),
            version_id,
        },
        LoadOutcome::Unchanged { version_id } => ReloadResponse {
            outcome: "unchanged".to_string(),
            version_id,
        },
    };
    Ok(Json(response))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}
