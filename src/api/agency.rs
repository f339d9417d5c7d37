//! Agency-fee wallet routes.

use super::{ApiJson, ApiResult, AppState};
use crate::{
    core::agency::{self, AgencyReconciliation, DeductionReceipt, NewDeduction},
    entities::{AgencyItem, agency_fee_deduction},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;

/// Body of `POST /api/agency/deductions`.
#[derive(Debug, Deserialize)]
pub struct DeductionRequest {
    /// Student whose wallet is charged
    pub student_id: i64,
    /// Item identifier or label
    pub item_type: String,
    /// Amount
    pub amount: f64,
    /// Defaults to today
    #[serde(default)]
    pub item_date: Option<NaiveDate>,
    /// Optional note
    #[serde(default)]
    pub remark: Option<String>,
}

/// Routes that only read.
pub fn read_routes() -> Router<AppState> {
    Router::new().route("/api/agency/reconciliation", get(reconciliation))
}

/// Routes that change the wallet.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/api/agency/deductions", post(create_deduction))
        .route("/api/agency/deductions/{id}", delete(remove_deduction))
}

/// POST /api/agency/deductions
pub async fn create_deduction(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<DeductionRequest>,
) -> ApiResult<Json<DeductionReceipt>> {
    let item_type: AgencyItem = payload.item_type.parse()?;
    let receipt = agency::add_deduction(
        &state.db,
        NewDeduction {
            student_id: payload.student_id,
            item_type,
            amount: payload.amount,
            item_date: payload
                .item_date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            remark: payload.remark,
        },
    )
    .await?;
    Ok(Json(receipt))
}

/// DELETE /api/agency/deductions/{id}
pub async fn remove_deduction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<agency_fee_deduction::Model>> {
    Ok(Json(agency::remove_deduction(&state.db, id).await?))
}

/// GET /api/agency/reconciliation - students whose counter disagrees with the ledger
pub async fn reconciliation(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AgencyReconciliation>>> {
    Ok(Json(agency::find_agency_mismatches(&state.db).await?))
}
