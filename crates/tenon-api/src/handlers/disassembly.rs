//! Disassembly HTTP handlers.
//!
//! - `POST /api/v1/assets/:id/disassemble` runs one disassembly
//! - `GET /api/v1/disassemble-operations/:token` polls the ledger entry

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use tenon_core::{
    ComponentActionRequest, DisassembleOperation, DisassembleRequest, DisassembleResult,
    DisposeOriginal, DocumentMigration, Error, HistoryMigration,
};

use crate::context::Caller;
use crate::{ApiError, AppState};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Request body; the target asset comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassembleBody {
    #[serde(default)]
    pub operation_token: Option<String>,
    pub component_actions: Vec<ComponentActionRequest>,
    #[serde(default)]
    pub dispose_original: DisposeOriginal,
    #[serde(default)]
    pub migrate_history: HistoryMigration,
    #[serde(default)]
    pub migrate_documents: DocumentMigration,
}

impl DisassembleBody {
    /// Build the engine request. A token in the body wins over the
    /// `Idempotency-Key` header; with neither, validation rejects it.
    pub fn into_request(self, asset_id: i64, headers: &HeaderMap) -> DisassembleRequest {
        let operation_token = self
            .operation_token
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                headers
                    .get(IDEMPOTENCY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        DisassembleRequest {
            operation_token,
            target_asset_id: asset_id,
            component_actions: self.component_actions,
            dispose_original: self.dispose_original,
            migrate_history: self.migrate_history,
            migrate_documents: self.migrate_documents,
        }
    }
}

/// Disassemble an asset.
///
/// POST /api/v1/assets/:id/disassemble
pub async fn disassemble_asset(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(asset_id): Path<i64>,
    headers: HeaderMap,
    body: Result<Json<DisassembleBody>, JsonRejection>,
) -> Result<Json<DisassembleResult>, ApiError> {
    let Json(body) = body.map_err(|e| Error::InvalidInput(e.body_text()))?;
    let req = body.into_request(asset_id, &headers);
    let result = state.engine.disassemble(ctx, req).await?;
    Ok(Json(result))
}

/// Poll a disassembly by operation token.
///
/// GET /api/v1/disassemble-operations/:token
pub async fn get_operation(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(token): Path<String>,
) -> Result<Json<DisassembleOperation>, ApiError> {
    let operation = state
        .engine
        .operation(ctx, &token)
        .await?
        .ok_or_else(|| Error::NotFound(format!("operation {}", token)))?;
    Ok(Json(operation))
}
