//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use review_core::ReviewWorkflow;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: ReviewWorkflow,
    pub config: Arc<Config>,
}
