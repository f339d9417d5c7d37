//! Expense ledger routes.

use super::{ApiJson, ApiResult, AppState};
use crate::{
    core::expense::{self, ExpenseFilter, ExpenseSummary, NewExpense},
    entities::{ExpenseCategory, expense_record},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get},
};
use chrono::NaiveDate;
use serde::Deserialize;

/// Body of `POST /api/expenses`.
#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    /// Category identifier or label
    pub category: String,
    /// Item within the category
    pub item: String,
    /// Defaults to today
    #[serde(default)]
    pub report_date: Option<NaiveDate>,
    /// Defaults to the report date
    #[serde(default)]
    pub occur_date: Option<NaiveDate>,
    /// Invoice number
    #[serde(default)]
    pub invoice_no: Option<String>,
    /// Amount
    pub amount: f64,
    /// Short summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Remark
    #[serde(default)]
    pub remark: Option<String>,
}

/// Routes that only read.
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/expenses", get(list))
        .route("/api/expenses/summary", get(summary))
}

/// Routes that change the expense ledger.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/api/expenses", axum::routing::post(create))
        .route("/api/expenses/{id}", delete(remove))
}

/// GET /api/expenses?category=&from=&to=
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ExpenseFilter>,
) -> ApiResult<Json<Vec<expense_record::Model>>> {
    Ok(Json(expense::list_expenses(&state.db, &filter).await?))
}

/// GET /api/expenses/summary
pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<ExpenseSummary>> {
    Ok(Json(expense::expense_summary(&state.db).await?))
}

/// POST /api/expenses
pub async fn create(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ExpenseRequest>,
) -> ApiResult<Json<expense_record::Model>> {
    let category: ExpenseCategory = payload.category.parse()?;
    let report_date = payload
        .report_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let record = expense::create_expense(
        &state.db,
        NewExpense {
            category,
            item: payload.item,
            report_date,
            occur_date: payload.occur_date.unwrap_or(report_date),
            invoice_no: payload.invoice_no,
            amount: payload.amount,
            summary: payload.summary,
            remark: payload.remark,
        },
    )
    .await?;
    Ok(Json(record))
}

/// DELETE /api/expenses/{id}
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<expense_record::Model>> {
    Ok(Json(expense::delete_expense(&state.db, id).await?))
}
