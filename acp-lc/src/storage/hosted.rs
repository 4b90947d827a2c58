//! Hosted row-store backend
//!
//! Speaks a PostgREST-style REST dialect: upserts go through
//! `Prefer: resolution=merge-duplicates` with an `on_conflict` column, and
//! lookups use column-equality query filters. All transport and API
//! failures collapse into [`StorageError`] so the orchestrator can treat
//! this backend like any other.

use super::{StorageBackend, StorageError};
use acp_common::db::{LeadRecord, NewLead, PartialQualification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const BACKEND_NAME: &str = "hosted";
const USER_AGENT: &str = concat!("acp-lc/", env!("CARGO_PKG_VERSION"));
const LEADS_TABLE: &str = "leads";
const QUALIFICATIONS_TABLE: &str = "partial_qualifications";

/// Lead row as returned by the hosted API
///
/// Timestamps are optional because the store fills them server-side and
/// older rows may predate the columns.
#[derive(Debug, Deserialize)]
struct HostedLeadRow {
    email: String,
    phone: String,
    is_programmer: bool,
    #[serde(default)]
    utm_source: Option<String>,
    #[serde(default)]
    utm_medium: Option<String>,
    #[serde(default)]
    utm_campaign: Option<String>,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl HostedLeadRow {
    fn into_record(self) -> LeadRecord {
        let now = Utc::now();
        LeadRecord {
            email: self.email,
            phone: self.phone,
            is_programmer: self.is_programmer,
            utm_source: self
                .utm_source
                .unwrap_or_else(|| acp_common::db::UTM_SOURCE_DIRECT.to_string()),
            utm_medium: self
                .utm_medium
                .unwrap_or_else(|| acp_common::db::UTM_NOT_SET.to_string()),
            utm_campaign: self
                .utm_campaign
                .unwrap_or_else(|| acp_common::db::UTM_NOT_SET.to_string()),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

/// Client for the hosted document/row store
pub struct HostedTableBackend {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HostedTableBackend {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StorageError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::new(BACKEND_NAME, e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(StorageError::new(BACKEND_NAME, "invalid API key"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::new(
                BACKEND_NAME,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl StorageBackend for HostedTableBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn upsert_lead(&self, lead: &NewLead) -> Result<LeadRecord, StorageError> {
        let body = json!([{
            "email": lead.email,
            "phone": lead.phone,
            "is_programmer": lead.is_programmer,
            "utm_source": lead.attribution.source(),
            "utm_medium": lead.attribution.medium(),
            "utm_campaign": lead.attribution.campaign(),
            "ip_address": lead.attribution.ip_address,
            "user_agent": lead.attribution.user_agent,
        }]);

        let response = self
            .authed(self.http_client.post(self.table_url(LEADS_TABLE)))
            .query(&[("on_conflict", "email")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::new(BACKEND_NAME, e.to_string()))?;

        let response = Self::check_status(response).await?;
        let rows: Vec<HostedLeadRow> = response
            .json()
            .await
            .map_err(|e| StorageError::new(BACKEND_NAME, format!("parse error: {}", e)))?;

        rows.into_iter()
            .next()
            .map(HostedLeadRow::into_record)
            .ok_or_else(|| StorageError::new(BACKEND_NAME, "upsert returned no rows"))
    }

    async fn put_qualification(
        &self,
        qualification: &PartialQualification,
    ) -> Result<(), StorageError> {
        let body = json!([{
            "session_id": qualification.session_id,
            "is_programmer": qualification.is_programmer,
            "utm_source": qualification.utm_source,
            "utm_medium": qualification.utm_medium,
            "utm_campaign": qualification.utm_campaign,
            "ip_address": qualification.ip_address,
            "user_agent": qualification.user_agent,
            "captured_at": qualification.captured_at,
        }]);

        let response = self
            .authed(self.http_client.post(self.table_url(QUALIFICATIONS_TABLE)))
            .query(&[("on_conflict", "session_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::new(BACKEND_NAME, e.to_string()))?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn find_qualification(
        &self,
        session_id: &str,
    ) -> Result<Option<PartialQualification>, StorageError> {
        let response = self
            .authed(self.http_client.get(self.table_url(QUALIFICATIONS_TABLE)))
            .query(&[
                ("session_id", format!("eq.{}", session_id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| StorageError::new(BACKEND_NAME, e.to_string()))?;

        let response = Self::check_status(response).await?;
        let rows: Vec<PartialQualification> = response
            .json()
            .await
            .map_err(|e| StorageError::new(BACKEND_NAME, format!("parse error: {}", e)))?;

        Ok(rows.into_iter().next())
    }

    async fn purge_qualifications(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let response = self
            .authed(self.http_client.delete(self.table_url(QUALIFICATIONS_TABLE)))
            .query(&[("captured_at", format!("lt.{}", cutoff.to_rfc3339()))])
            .send()
            .await
            .map_err(|e| StorageError::new(BACKEND_NAME, e.to_string()))?;

        Self::check_status(response).await?;
        // The store does not report a deleted-row count on this path
        Ok(0)
    }
}
