//! Error types for the scheduler module

use crate::error::AppError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to start scheduler: {0}")]
    StartupFailed(String),

    #[error("Failed to shutdown scheduler: {0}")]
    ShutdownFailed(String),

    #[error("Failed to create job: {0}")]
    JobCreationFailed(String),

    #[error("Job already exists: {0}")]
    JobAlreadyExists(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::JobAlreadyExists(msg) => AppError::Conflict(msg),
            SchedulerError::ConfigurationError(msg) => AppError::Configuration(msg),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_app_error() {
        let err: AppError = SchedulerError::JobAlreadyExists("refresh".to_string()).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = SchedulerError::ConfigurationError("zero interval".to_string()).into();
        assert!(matches!(err, AppError::Configuration(_)));

        let err: AppError = SchedulerError::StartupFailed("boom".to_string()).into();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
