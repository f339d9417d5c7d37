//! Bulk import and export routes.

use super::{ApiJson, ApiResult, AppState};
use crate::core::transfer::{self, ExportRow, ImportRow, ImportSummary};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;

/// Body of `POST /api/transfer/import`.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// Rows to upsert
    pub rows: Vec<ImportRow>,
    /// Date for payments created from paid figures, defaults to today
    #[serde(default)]
    pub import_date: Option<NaiveDate>,
}

/// Routes that only read.
pub fn read_routes() -> Router<AppState> {
    Router::new().route("/api/transfer/export", get(export))
}

/// Routes that write.
pub fn write_routes() -> Router<AppState> {
    Router::new().route("/api/transfer/import", post(import))
}

/// POST /api/transfer/import
pub async fn import(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ImportRequest>,
) -> ApiResult<Json<ImportSummary>> {
    let summary = transfer::upsert_students(
        &state.db,
        payload.rows,
        payload
            .import_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        state.settings.fees.default_agency_fee,
    )
    .await?;
    Ok(Json(summary))
}

/// GET /api/transfer/export
pub async fn export(State(state): State<AppState>) -> ApiResult<Json<Vec<ExportRow>>> {
    Ok(Json(transfer::export_rows(&state.db).await?))
}
