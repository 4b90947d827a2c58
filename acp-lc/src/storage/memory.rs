//! In-memory storage backend
//!
//! The configuration's `"memory"` option: nothing survives a restart, but
//! the upsert semantics match the durable backends. Also serves as the
//! test double for the orchestrator and API suites.

use super::{StorageBackend, StorageError};
use acp_common::db::{LeadRecord, NewLead, PartialQualification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

const BACKEND_NAME: &str = "memory";

#[derive(Default)]
struct MemoryInner {
    leads: HashMap<String, LeadRecord>,
    qualifications: HashMap<String, PartialQualification>,
}

/// Volatile in-process store
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored lead by email (test inspection)
    pub async fn lead(&self, email: &str) -> Option<LeadRecord> {
        self.inner.lock().await.leads.get(email).cloned()
    }

    /// Number of stored leads (test inspection)
    pub async fn lead_count(&self) -> usize {
        self.inner.lock().await.leads.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn upsert_lead(&self, lead: &NewLead) -> Result<LeadRecord, StorageError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let record = match inner.leads.get(&lead.email) {
            Some(existing) => LeadRecord {
                email: lead.email.clone(),
                phone: lead.phone.clone(),
                is_programmer: lead.is_programmer,
                utm_source: lead.attribution.source().to_string(),
                utm_medium: lead.attribution.medium().to_string(),
                utm_campaign: lead.attribution.campaign().to_string(),
                ip_address: lead
                    .attribution
                    .ip_address
                    .clone()
                    .or_else(|| existing.ip_address.clone()),
                user_agent: lead
                    .attribution
                    .user_agent
                    .clone()
                    .or_else(|| existing.user_agent.clone()),
                created_at: existing.created_at,
                updated_at: now,
            },
            None => LeadRecord {
                email: lead.email.clone(),
                phone: lead.phone.clone(),
                is_programmer: lead.is_programmer,
                utm_source: lead.attribution.source().to_string(),
                utm_medium: lead.attribution.medium().to_string(),
                utm_campaign: lead.attribution.campaign().to_string(),
                ip_address: lead.attribution.ip_address.clone(),
                user_agent: lead.attribution.user_agent.clone(),
                created_at: now,
                updated_at: now,
            },
        };

        inner.leads.insert(lead.email.clone(), record.clone());
        Ok(record)
    }

    async fn put_qualification(
        &self,
        qualification: &PartialQualification,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner
            .qualifications
            .insert(qualification.session_id.clone(), qualification.clone());
        Ok(())
    }

    async fn find_qualification(
        &self,
        session_id: &str,
    ) -> Result<Option<PartialQualification>, StorageError> {
        Ok(self.inner.lock().await.qualifications.get(session_id).cloned())
    }

    async fn purge_qualifications(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut inner = self.inner.lock().await;
        let before = inner.qualifications.len();
        inner.qualifications.retain(|_, q| q.captured_at >= cutoff);
        Ok((before - inner.qualifications.len()) as u64)
    }
}
