//! HTTP API for the Gita Essence chat
//!
//! One conversation per server process: JSON endpoints for user actions
//! and snapshots, plus an SSE stream of transcript changes.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::RuntimeHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: RuntimeHandle,
    pub model_id: String,
}

impl AppState {
    pub fn new(runtime: RuntimeHandle, model_id: impl Into<String>) -> Self {
        Self {
            runtime,
            model_id: model_id.into(),
        }
    }
}
