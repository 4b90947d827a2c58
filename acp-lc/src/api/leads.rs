//! Lead capture endpoints
//!
//! `POST /partial-lead` records the qualification answer before contact
//! details exist; `POST /submit-lead` persists the full lead. Wire field
//! names are camelCase to match the landing page client.

use crate::orchestrator::LeadSubmission;
use crate::{ApiError, ApiResult, AppState};
use acp_common::db::Attribution;
use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialLeadRequest {
    pub session_id: Option<String>,
    pub is_programmer: Option<bool>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PartialLeadResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadRequest {
    pub session_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_programmer: Option<bool>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadResponse {
    pub success: bool,
    pub used_fallback: bool,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Client IP as reported by the reverse proxy (first forwarded hop)
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
}

/// POST /partial-lead
///
/// Fire-and-forget qualification capture: returns success on any storage
/// outcome; only malformed input is rejected.
pub async fn partial_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PartialLeadRequest>,
) -> ApiResult<Json<PartialLeadResponse>> {
    let session_id = payload
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("sessionId is required".to_string()))?;

    let is_programmer = payload
        .is_programmer
        .ok_or_else(|| ApiError::BadRequest("isProgrammer is required".to_string()))?;

    let attribution = Attribution {
        utm_source: payload.utm_source,
        utm_medium: payload.utm_medium,
        utm_campaign: payload.utm_campaign,
        ip_address: payload.ip_address.or_else(|| forwarded_ip(&headers)),
        user_agent: payload
            .user_agent
            .or_else(|| header_value(&headers, "user-agent")),
    };

    state
        .tracker
        .record(session_id, is_programmer, attribution)
        .await?;

    Ok(Json(PartialLeadResponse { success: true }))
}

/// POST /submit-lead
///
/// Persists the lead through the backend chain. Returns 200 with
/// `usedFallback` on any successful persistence; 500 only when the local
/// fallback failed as well.
pub async fn submit_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitLeadRequest>,
) -> ApiResult<Json<SubmitLeadResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("email is required".to_string()))?;

    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("phone is required".to_string()))?;

    let attribution = Attribution {
        utm_source: payload.utm_source,
        utm_medium: payload.utm_medium,
        utm_campaign: payload.utm_campaign,
        ip_address: forwarded_ip(&headers),
        user_agent: header_value(&headers, "user-agent"),
    };

    let submission = LeadSubmission {
        session_id: payload.session_id,
        email: email.to_string(),
        phone: phone.to_string(),
        fallback_is_programmer: payload.is_programmer.unwrap_or(false),
        attribution,
    };

    let outcome = state
        .orchestrator
        .submit(submission)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(SubmitLeadResponse {
        success: true,
        used_fallback: outcome.used_fallback,
    }))
}
