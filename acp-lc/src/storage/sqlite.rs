//! Relational storage backend over the shared sqlite pool

use super::{StorageBackend, StorageError};
use acp_common::db::{LeadRecord, NewLead, PartialQualification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const BACKEND_NAME: &str = "sqlite";

/// Lead storage against the local relational database
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn storage_err(e: sqlx::Error) -> StorageError {
        StorageError::new(BACKEND_NAME, e.to_string())
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn upsert_lead(&self, lead: &NewLead) -> Result<LeadRecord, StorageError> {
        let now = Utc::now();

        // created_at is deliberately NOT updated on conflict: it marks the
        // first successful persistence of this email.
        sqlx::query(
            r#"
            INSERT INTO leads (
                email, phone, is_programmer,
                utm_source, utm_medium, utm_campaign,
                ip_address, user_agent,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                phone = excluded.phone,
                is_programmer = excluded.is_programmer,
                utm_source = excluded.utm_source,
                utm_medium = excluded.utm_medium,
                utm_campaign = excluded.utm_campaign,
                ip_address = COALESCE(excluded.ip_address, leads.ip_address),
                user_agent = COALESCE(excluded.user_agent, leads.user_agent),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.is_programmer)
        .bind(lead.attribution.source())
        .bind(lead.attribution.medium())
        .bind(lead.attribution.campaign())
        .bind(&lead.attribution.ip_address)
        .bind(&lead.attribution.user_agent)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Self::storage_err)?;

        // Load the row back so the caller sees the stored record (created_at
        // differs from `now` when the upsert hit an existing row)
        let record = sqlx::query_as::<_, LeadRecord>(
            r#"
            SELECT email, phone, is_programmer,
                   utm_source, utm_medium, utm_campaign,
                   ip_address, user_agent,
                   created_at, updated_at
            FROM leads
            WHERE email = ?
            "#,
        )
        .bind(&lead.email)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::storage_err)?;

        Ok(record)
    }

    async fn put_qualification(
        &self,
        qualification: &PartialQualification,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO partial_qualifications (
                session_id, is_programmer,
                utm_source, utm_medium, utm_campaign,
                ip_address, user_agent,
                captured_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                is_programmer = excluded.is_programmer,
                utm_source = excluded.utm_source,
                utm_medium = excluded.utm_medium,
                utm_campaign = excluded.utm_campaign,
                ip_address = excluded.ip_address,
                user_agent = excluded.user_agent,
                captured_at = excluded.captured_at
            "#,
        )
        .bind(&qualification.session_id)
        .bind(qualification.is_programmer)
        .bind(&qualification.utm_source)
        .bind(&qualification.utm_medium)
        .bind(&qualification.utm_campaign)
        .bind(&qualification.ip_address)
        .bind(&qualification.user_agent)
        .bind(qualification.captured_at)
        .execute(&self.pool)
        .await
        .map_err(Self::storage_err)?;

        Ok(())
    }

    async fn find_qualification(
        &self,
        session_id: &str,
    ) -> Result<Option<PartialQualification>, StorageError> {
        sqlx::query_as::<_, PartialQualification>(
            r#"
            SELECT session_id, is_programmer,
                   utm_source, utm_medium, utm_campaign,
                   ip_address, user_agent,
                   captured_at
            FROM partial_qualifications
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::storage_err)
    }

    async fn purge_qualifications(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM partial_qualifications WHERE captured_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(Self::storage_err)?;

        Ok(result.rows_affected())
    }
}
