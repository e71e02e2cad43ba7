//! Server state.

use crate::pipeline::Pipeline;

/// Application state shared across handlers.
pub struct AppState {
    /// Expected `apikey` value; `None` rejects every render request.
    pub api_key: Option<String>,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(api_key: Option<String>, pipeline: Pipeline) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            pipeline,
        }
    }

    /// Whether `provided` matches the configured key.
    pub fn authorize(&self, provided: Option<&str>) -> bool {
        match (self.api_key.as_deref(), provided) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }
}
