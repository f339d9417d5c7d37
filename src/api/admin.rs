//! Irreversible administrative routes.

use super::{ApiResult, AppState, Confirmation};
use crate::core::{
    maintenance::{self, DeletionSummary},
    promotion::{self, PromotionSummary},
};
use axum::{Json, Router, extract::State, routing::post};

/// Admin routes; all of them write.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/promote", post(promote))
        .route("/api/admin/wipe", post(wipe))
}

/// POST /api/admin/promote - body `{ "confirmed": true }`
pub async fn promote(
    State(state): State<AppState>,
    confirmation: Confirmation,
) -> ApiResult<Json<PromotionSummary>> {
    let summary = promotion::promote_classes(&state.db, confirmation.confirmed).await?;
    tracing::info!("{}", promotion::format_promotion_summary(&summary));
    Ok(Json(summary))
}

/// POST /api/admin/wipe - body `{ "confirmed": true }`
pub async fn wipe(
    State(state): State<AppState>,
    confirmation: Confirmation,
) -> ApiResult<Json<DeletionSummary>> {
    Ok(Json(
        maintenance::wipe_all_data(&state.db, confirmation.confirmed).await?,
    ))
}
