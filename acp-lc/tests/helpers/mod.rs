//! Shared test helpers for acp-lc integration tests
#![allow(dead_code)]

use acp_common::db::{LeadRecord, NewLead, PartialQualification};
use acp_lc::orchestrator::LeadOrchestrator;
use acp_lc::storage::{FallbackStore, StorageBackend, StorageError};
use acp_lc::tracker::QualificationTracker;
use acp_lc::AppState;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Backend that refuses every operation
pub struct FailingBackend;

#[async_trait]
impl StorageBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn upsert_lead(&self, _lead: &NewLead) -> Result<LeadRecord, StorageError> {
        Err(StorageError::new("failing", "write refused"))
    }

    async fn put_qualification(
        &self,
        _qualification: &PartialQualification,
    ) -> Result<(), StorageError> {
        Err(StorageError::new("failing", "write refused"))
    }

    async fn find_qualification(
        &self,
        _session_id: &str,
    ) -> Result<Option<PartialQualification>, StorageError> {
        Err(StorageError::new("failing", "read refused"))
    }
}

/// Backend whose lead writes hang long enough to trip any sane timeout
pub struct SlowBackend;

#[async_trait]
impl StorageBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn upsert_lead(&self, _lead: &NewLead) -> Result<LeadRecord, StorageError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Err(StorageError::new("slow", "unreachable"))
    }

    async fn put_qualification(
        &self,
        _qualification: &PartialQualification,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn find_qualification(
        &self,
        _session_id: &str,
    ) -> Result<Option<PartialQualification>, StorageError> {
        Ok(None)
    }
}

/// Wire a tracker + orchestrator + state from a backend chain
pub fn build_state(
    backends: Vec<Arc<dyn StorageBackend>>,
    fallback_path: PathBuf,
    backend_timeout: Duration,
) -> AppState {
    let tracker = Arc::new(QualificationTracker::new(backends.clone(), 24));
    let orchestrator = Arc::new(LeadOrchestrator::new(
        backends,
        FallbackStore::new(fallback_path),
        tracker.clone(),
        backend_timeout,
    ));
    AppState::new(orchestrator, tracker)
}
