//! acp-lc library - Lead Capture module
//!
//! Receives qualification answers and contact submissions from the AI Code
//! Pro landing page and persists them through the configured storage chain.

use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod storage;
pub mod tracker;

pub use error::{ApiError, ApiResult};

use orchestrator::LeadOrchestrator;
use tracker::QualificationTracker;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<LeadOrchestrator>,
    pub tracker: Arc<QualificationTracker>,
}

impl AppState {
    /// Create new application state
    pub fn new(orchestrator: Arc<LeadOrchestrator>, tracker: Arc<QualificationTracker>) -> Self {
        Self {
            orchestrator,
            tracker,
        }
    }
}

/// Build application router
///
/// CORS is permissive: the landing page is served from a different origin
/// than this API.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/partial-lead", post(api::partial_lead))
        .route("/submit-lead", post(api::submit_lead))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
