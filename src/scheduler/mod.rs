//! Background jobs on tokio-cron-scheduler.
//!
//! The server uses it to refresh the active pipeline on a fixed interval and,
//! when training is embedded, to retrain on the training interval.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use url_sentinel::scheduler::SchedulerService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scheduler = SchedulerService::new().await?;
//!     scheduler
//!         .add_repeated("heartbeat", Duration::from_secs(60), || async {
//!             Ok("alive".to_string())
//!         })
//!         .await?;
//!     scheduler.start().await?;
//!
//!     tokio::time::sleep(Duration::from_secs(120)).await;
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod tasks;

pub use core::SchedulerService;
pub use error::{SchedulerError, SchedulerResult};
pub use tasks::{
    refresh_model, schedule_model_refresh, schedule_training, train_model, MODEL_REFRESH_JOB,
    TRAINING_JOB,
};
