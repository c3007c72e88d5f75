//! URL Sentinel: benign/malicious URL classification.
//!
//! A URL is turned into a fixed feature record by [`extraction`], classified by
//! a fitted [`ml::UrlPipeline`] held in the [`serving`] runtime, and the
//! observed row is appended to the training corpus. The trainer binary refits
//! the pipeline on a schedule and publishes it through [`artifacts`] and the
//! [`state`] registry.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod extraction;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod scheduler;
pub mod serving;
pub mod state;
pub mod telemetry;

pub use error::{AppError, Result};
