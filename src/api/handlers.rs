use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::MatchConfig;
use crate::models::{InvoiceRecord, MatchResult, ShipmentRecord};
use crate::service::ReconEngine;

/// Full run input: the document source's invoices plus the ledger
/// repository's open-record snapshot. Matching tunables may be overridden
/// per request.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub invoices: Vec<InvoiceRecord>,
    pub shipments: Vec<ShipmentRecord>,
    #[serde(default)]
    pub config: Option<MatchConfig>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub message: String,
    pub results: Option<Vec<MatchResult>>,
}

/// Health check.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Batch reconciliation endpoint. Transport only: all matching semantics
/// live in the engine.
pub async fn reconcile(
    State(config): State<Arc<MatchConfig>>,
    Json(req): Json<ReconcileRequest>,
) -> Response {
    let effective = req.config.unwrap_or_else(|| (*config).clone());
    let engine = ReconEngine::new(effective);

    match engine.reconcile(&req.invoices, req.shipments) {
        Ok(results) => {
            let matched = results.iter().filter(|r| r.is_matched()).count();
            let response = ReconcileResponse {
                success: true,
                message: format!(
                    "Reconciled {} invoices, {} matched",
                    results.len(),
                    matched
                ),
                results: Some(results),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = ReconcileResponse {
                success: false,
                message: format!("Error: {}", e),
                results: None,
            };
            (StatusCode::BAD_REQUEST, Json(response)).into_response()
        }
    }
}
