pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::serving::ServingRuntime;
use crate::state::ModelRegistry;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ServingRuntime>,
    pub registry: Arc<dyn ModelRegistry>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(runtime: Arc<ServingRuntime>, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            runtime,
            registry,
            started_at: Instant::now(),
        }
    }
}
