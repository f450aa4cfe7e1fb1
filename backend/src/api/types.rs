//! REST API types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ServerError;
use crate::models::ReconMode;
use crate::parser::HeaderDetection;
use crate::recon::classify::ReconSummary;
use crate::recon::matcher::JoinKind;
use crate::recon::pipeline::ReconOutcome;
use crate::recon::profile::{all_profiles, SideProfile};

/// Response to `POST /api/v1/reconcile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    /// Always `"success"`; failures use [`error_response`].
    pub status: String,
    pub mode: ReconMode,
    /// Status label to row count.
    pub summary: BTreeMap<String, usize>,
    pub preview_data: Vec<Map<String, Value>>,
    pub mismatches: Vec<Map<String, Value>>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub job_id: String,
    pub total_rows: usize,
    pub join: JoinKind,
    pub bank_header: HeaderInfo,
    pub provider_header: HeaderInfo,
}

/// Where a side's header was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub row: usize,
    /// `false` when the mode's default row was used.
    pub detected: bool,
    pub matches: usize,
}

impl From<&HeaderDetection> for HeaderInfo {
    fn from(detection: &HeaderDetection) -> Self {
        Self {
            row: detection.row(),
            detected: detection.is_detected(),
            matches: detection.matches(),
        }
    }
}

impl ReconcileResponse {
    pub fn new(outcome: &ReconOutcome, summary: ReconSummary) -> Self {
        Self {
            status: "success".to_string(),
            mode: outcome.mode,
            summary: summary.summary,
            preview_data: summary.preview,
            mismatches: summary.mismatches,
            metadata: ResponseMetadata {
                job_id: Uuid::new_v4().to_string(),
                total_rows: summary.total_rows,
                join: outcome.result.join,
                bank_header: HeaderInfo::from(&outcome.bank.header),
                provider_header: HeaderInfo::from(&outcome.provider.header),
            },
        }
    }
}

/// Entry of `GET /api/v1/modes`.
#[derive(Debug, Clone, Serialize)]
pub struct ModeInfo {
    pub mode: ReconMode,
    pub label: &'static str,
    pub role_split: bool,
    pub bank: &'static SideProfile,
    pub provider: &'static SideProfile,
}

pub fn mode_catalog() -> Vec<ModeInfo> {
    all_profiles()
        .into_iter()
        .map(|p| ModeInfo {
            mode: p.mode,
            label: p.mode.label(),
            role_split: p.role_split,
            bank: &p.bank,
            provider: &p.provider,
        })
        .collect()
}

/// Create an error response body.
pub fn error_response(detail: &str) -> Value {
    json!({
        "status": "error",
        "detail": detail,
    })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Pipeline(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Reconciliation failed: {}", err),
            ),
            ServerError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Reconciliation failed: {}", msg),
            ),
        };
        (status, Json(error_response(&detail))).into_response()
    }
}
