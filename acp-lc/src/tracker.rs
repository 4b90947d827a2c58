//! Partial-qualification tracking
//!
//! Records the pre-contact qualification answer ("do you already
//! program?") keyed by the client-generated session id. Capture is
//! fire-and-forget: storage failures are logged and swallowed so the
//! answer click never blocks the visitor's funnel. The answer is
//! reconciled into the lead at submission time by the orchestrator.

use crate::storage::StorageBackend;
use acp_common::db::{Attribution, PartialQualification};
use acp_common::{Error, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct QualificationTracker {
    backends: Vec<Arc<dyn StorageBackend>>,
    ttl_hours: i64,
}

impl QualificationTracker {
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>, ttl_hours: i64) -> Self {
        Self { backends, ttl_hours }
    }

    /// Record a qualification answer for a session (last write wins)
    ///
    /// Returns `InvalidInput` for an empty session id. Storage failures are
    /// absorbed: the visitor's answer is not the only source of truth for
    /// the flag, so this call reports success once input is valid.
    pub async fn record(
        &self,
        session_id: &str,
        is_programmer: bool,
        attribution: Attribution,
    ) -> Result<()> {
        if session_id.trim().is_empty() {
            return Err(Error::InvalidInput("sessionId must not be empty".to_string()));
        }

        let qualification = PartialQualification {
            session_id: session_id.to_string(),
            is_programmer,
            utm_source: attribution.source().to_string(),
            utm_medium: attribution.medium().to_string(),
            utm_campaign: attribution.campaign().to_string(),
            ip_address: attribution.ip_address.clone(),
            user_agent: attribution.user_agent.clone(),
            captured_at: Utc::now(),
        };

        for backend in &self.backends {
            match backend.put_qualification(&qualification).await {
                Ok(()) => {
                    debug!(
                        session_id = %session_id,
                        is_programmer = is_programmer,
                        backend = backend.name(),
                        "Qualification recorded"
                    );
                    self.purge_stale(backend.as_ref()).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        error = %e,
                        "Qualification write failed, trying next backend"
                    );
                }
            }
        }

        // Best-effort capture: report success even when nothing stored
        warn!(
            session_id = %session_id,
            "Qualification capture dropped: all backends failed"
        );
        Ok(())
    }

    /// Look up the recorded answer for a session
    ///
    /// First backend with a non-stale entry wins; lookup failures degrade
    /// to `None` so the caller falls back to the form-submitted flag.
    pub async fn lookup(&self, session_id: &str) -> Option<PartialQualification> {
        let cutoff = Utc::now() - Duration::hours(self.ttl_hours);

        for backend in &self.backends {
            match backend.find_qualification(session_id).await {
                Ok(Some(q)) if q.captured_at > cutoff => return Some(q),
                Ok(Some(_)) => {
                    debug!(
                        session_id = %session_id,
                        backend = backend.name(),
                        "Qualification found but stale, ignoring"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        error = %e,
                        "Qualification lookup failed, trying next backend"
                    );
                }
            }
        }

        None
    }

    async fn purge_stale(&self, backend: &dyn StorageBackend) {
        let cutoff = Utc::now() - Duration::hours(self.ttl_hours);
        match backend.purge_qualifications(cutoff).await {
            Ok(0) => {}
            Ok(n) => debug!(backend = backend.name(), purged = n, "Purged stale qualifications"),
            Err(e) => debug!(error = %e, "Stale qualification purge failed"),
        }
    }
}
