//! Scheduled tasks of the prediction server

use super::core::SchedulerService;
use super::error::SchedulerResult;
use crate::error::{AppError, Result};
use crate::ml::TrainingService;
use crate::serving::{LoadOutcome, ServingRuntime};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub const MODEL_REFRESH_JOB: &str = "model_refresh";
pub const TRAINING_JOB: &str = "training";

/// Swap in the best registered model if it changed.
///
/// A failure leaves the active pipeline in place.
pub async fn refresh_model(runtime: Arc<ServingRuntime>) -> Result<String> {
    info!("Refreshing active model");

    let summary = match runtime.refresh().await? {
        LoadOutcome::Loaded { version_id } => format!("loaded {}", version_id),
        LoadOutcome::Unchanged { version_id } => format!("unchanged {}", version_id),
    };
    Ok(summary)
}

pub async fn schedule_model_refresh(
    scheduler: &SchedulerService,
    runtime: Arc<ServingRuntime>,
    every: Duration,
) -> SchedulerResult<Uuid> {
    scheduler
        .add_repeated(MODEL_REFRESH_JOB, every, move || {
            refresh_model(runtime.clone())
        })
        .await
}

/// One training run followed by a refresh, so a better model serves at once.
///
/// Evaluation and storage failures are reported and the next run still
/// happens; unusable training data retires the job (see [`schedule_training`]).
pub async fn train_model(
    service: Arc<TrainingService>,
    runtime: Arc<ServingRuntime>,
) -> Result<String> {
    let report = service.run_once().await?;
    let outcome = runtime.refresh().await?;
    Ok(format!(
        "published {} (f1 {:.4}), serving {}",
        report.model.version_id,
        report.model.f1_score,
        outcome.version_id()
    ))
}

pub async fn schedule_training(
    scheduler: &SchedulerService,
    service: Arc<TrainingService>,
    runtime: Arc<ServingRuntime>,
    every: Duration,
) -> SchedulerResult<Uuid> {
    scheduler
        .add_repeated_until(
            TRAINING_JOB,
            every,
            move || train_model(service.clone(), runtime.clone()),
            AppError::is_unusable_training_data,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::EvaluationError;

    #[test]
    fn test_only_data_errors_retire_training() {
        assert!(AppError::Preprocessing("label".to_string()).is_unusable_training_data());
        assert!(AppError::Schema("columns".to_string()).is_unusable_training_data());
        assert!(!AppError::Storage("down".to_string()).is_unusable_training_data());
        assert!(!AppError::Evaluation(EvaluationError::DegenerateTestSplit { class: 1 })
            .is_unusable_training_data());
    }
}
