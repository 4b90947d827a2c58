//! Lead reconciliation and persistence
//!
//! Merges the partial qualification recorded for a session with the final
//! contact-detail submission, then walks the configured backend chain:
//! first remote success wins, otherwise the lead lands in the local
//! fallback file. Only when the fallback itself fails does the caller see
//! a hard error, since the lead is then genuinely at risk of loss.

use crate::storage::{FallbackStore, StorageBackend};
use crate::tracker::QualificationTracker;
use acp_common::db::{Attribution, FallbackRecord, NewLead};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A contact-detail submission from the presentation layer
#[derive(Debug, Clone)]
pub struct LeadSubmission {
    pub session_id: Option<String>,
    pub email: String,
    pub phone: String,
    /// Flag from the submission form, used only when no qualification was
    /// recorded for the session
    pub fallback_is_programmer: bool,
    pub attribution: Attribution,
}

/// Where a successfully persisted lead ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub used_fallback: bool,
    /// Name of the backend (or "fallback") that took the write
    pub backend: &'static str,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Malformed submission; surfaced as 400, never retried
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Every remote backend AND the local fallback failed
    #[error("Lead persistence exhausted; remote: [{remote}]; fallback: {fallback}")]
    Exhausted { remote: String, fallback: String },
}

pub struct LeadOrchestrator {
    backends: Vec<Arc<dyn StorageBackend>>,
    fallback: FallbackStore,
    tracker: Arc<QualificationTracker>,
    backend_timeout: Duration,
}

impl LeadOrchestrator {
    pub fn new(
        backends: Vec<Arc<dyn StorageBackend>>,
        fallback: FallbackStore,
        tracker: Arc<QualificationTracker>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            fallback,
            tracker,
            backend_timeout,
        }
    }

    pub fn fallback_store(&self) -> &FallbackStore {
        &self.fallback
    }

    /// Persist a lead submission
    ///
    /// Idempotent on email: a repeat submission updates the existing record
    /// instead of creating a duplicate.
    pub async fn submit(&self, submission: LeadSubmission) -> Result<SubmitOutcome, SubmitError> {
        if submission.email.trim().is_empty() {
            return Err(SubmitError::Validation("email must not be empty".to_string()));
        }
        if submission.phone.trim().is_empty() {
            return Err(SubmitError::Validation("phone must not be empty".to_string()));
        }

        let correlation_id = Uuid::new_v4();

        // Two-tier precedence: the qualification answer recorded at click
        // time beats the flag carried by the form submission.
        let (is_programmer, flag_source) = match &submission.session_id {
            Some(sid) if !sid.trim().is_empty() => match self.tracker.lookup(sid).await {
                Some(q) => (q.is_programmer, "qualification"),
                None => (submission.fallback_is_programmer, "form"),
            },
            _ => (submission.fallback_is_programmer, "form"),
        };

        let lead = NewLead {
            email: submission.email.clone(),
            phone: submission.phone.clone(),
            is_programmer,
            attribution: submission.attribution.clone(),
        };

        // Single attempt per backend per submission, each bounded by the
        // configured timeout; first success wins.
        let mut failures: Vec<String> = Vec::new();
        for backend in &self.backends {
            match tokio::time::timeout(self.backend_timeout, backend.upsert_lead(&lead)).await {
                Ok(Ok(record)) => {
                    info!(
                        correlation_id = %correlation_id,
                        email = %record.email,
                        is_programmer = is_programmer,
                        flag_source = flag_source,
                        backend = backend.name(),
                        "Lead persisted"
                    );
                    return Ok(SubmitOutcome {
                        used_fallback: false,
                        backend: backend.name(),
                    });
                }
                Ok(Err(e)) => {
                    warn!(
                        correlation_id = %correlation_id,
                        email = %submission.email,
                        error = %e,
                        "Backend write failed, advancing fallback chain"
                    );
                    failures.push(e.to_string());
                }
                Err(_) => {
                    warn!(
                        correlation_id = %correlation_id,
                        email = %submission.email,
                        backend = backend.name(),
                        timeout_secs = self.backend_timeout.as_secs(),
                        "Backend write timed out, advancing fallback chain"
                    );
                    failures.push(format!(
                        "{} backend timed out after {}s",
                        backend.name(),
                        self.backend_timeout.as_secs()
                    ));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no remote backends configured".to_string()
        } else {
            failures.join("; ")
        };

        let record = FallbackRecord::from_lead(&lead, reason.clone(), Utc::now());
        match self.fallback.append(record).await {
            Ok(()) => {
                warn!(
                    correlation_id = %correlation_id,
                    email = %submission.email,
                    is_programmer = is_programmer,
                    flag_source = flag_source,
                    reason = %reason,
                    "Lead persisted to local fallback"
                );
                Ok(SubmitOutcome {
                    used_fallback: true,
                    backend: "fallback",
                })
            }
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    email = %submission.email,
                    remote = %reason,
                    fallback = %e,
                    "Lead persistence exhausted"
                );
                Err(SubmitError::Exhausted {
                    remote: reason,
                    fallback: e.to_string(),
                })
            }
        }
    }
}
