//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for an unattributed visit (no utm_source)
pub const UTM_SOURCE_DIRECT: &str = "direct";

/// Sentinel for missing utm_medium/utm_campaign values
pub const UTM_NOT_SET: &str = "not_set";

/// UTM attribution plus request provenance attached to a capture
///
/// Fields stay optional in memory; sentinel defaults are applied at
/// persistence time so stored rows never carry NULL attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attribution {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Attribution {
    pub fn source(&self) -> &str {
        self.utm_source.as_deref().unwrap_or(UTM_SOURCE_DIRECT)
    }

    pub fn medium(&self) -> &str {
        self.utm_medium.as_deref().unwrap_or(UTM_NOT_SET)
    }

    pub fn campaign(&self) -> &str {
        self.utm_campaign.as_deref().unwrap_or(UTM_NOT_SET)
    }
}

/// Candidate lead ready for persistence
///
/// `is_programmer` has already been reconciled against any partial
/// qualification recorded for the visitor's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub email: String,
    pub phone: String,
    pub is_programmer: bool,
    pub attribution: Attribution,
}

/// Durable lead row as stored by a backend
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeadRecord {
    pub email: String,
    pub phone: String,
    pub is_programmer: bool,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pre-contact qualification answer keyed by session id
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PartialQualification {
    pub session_id: String,
    pub is_programmer: bool,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Lead written to the local fallback file after all remote backends failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub email: String,
    pub phone: String,
    pub is_programmer: bool,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Why the remote writes failed
    pub reason: String,
    pub backup_timestamp: DateTime<Utc>,
}

impl FallbackRecord {
    /// Build a fallback record from a candidate lead and the failure reason
    pub fn from_lead(lead: &NewLead, reason: String, at: DateTime<Utc>) -> Self {
        Self {
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            is_programmer: lead.is_programmer,
            utm_source: lead.attribution.source().to_string(),
            utm_medium: lead.attribution.medium().to_string(),
            utm_campaign: lead.attribution.campaign().to_string(),
            ip_address: lead.attribution.ip_address.clone(),
            user_agent: lead.attribution.user_agent.clone(),
            reason,
            backup_timestamp: at,
        }
    }
}
