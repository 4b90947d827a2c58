//! Storage backends for lead persistence
//!
//! A single polymorphic `StorageBackend` capability with concrete
//! implementations selected by configuration. The orchestrator walks the
//! configured chain without knowing any backend's wire format; every
//! backend-specific failure surfaces as a uniform [`StorageError`].

use acp_common::db::{LeadRecord, NewLead, PartialQualification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod fallback;
pub mod hosted;
pub mod memory;
pub mod sqlite;

pub use fallback::FallbackStore;
pub use hosted::HostedTableBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Uniform storage failure: which backend failed and the underlying cause
#[derive(Debug, Error)]
#[error("{backend} backend error: {cause}")]
pub struct StorageError {
    pub backend: &'static str,
    pub cause: String,
}

impl StorageError {
    pub fn new(backend: &'static str, cause: impl Into<String>) -> Self {
        Self {
            backend,
            cause: cause.into(),
        }
    }
}

/// A store that can hold leads and partial qualifications
///
/// `upsert_lead` must treat `email` as the conflict key, and
/// `put_qualification` must treat `session_id` the same way: a second
/// write for the same key updates the existing row.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend identifier used in logs and error messages
    fn name(&self) -> &'static str;

    /// Insert or update a lead, keyed by email
    async fn upsert_lead(&self, lead: &NewLead) -> Result<LeadRecord, StorageError>;

    /// Insert or update a partial qualification, keyed by session id
    async fn put_qualification(
        &self,
        qualification: &PartialQualification,
    ) -> Result<(), StorageError>;

    /// Look up the partial qualification for a session, if any
    async fn find_qualification(
        &self,
        session_id: &str,
    ) -> Result<Option<PartialQualification>, StorageError>;

    /// Delete qualifications captured before `cutoff`, returning how many
    /// were removed. Backends without a cheap delete may leave this as the
    /// default no-op.
    async fn purge_qualifications(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let _ = cutoff;
        Ok(0)
    }
}
