//! Statistics routes.

use super::{ApiResult, AppState};
use crate::core::statistics::{self, SchoolStatistics};
use axum::{Json, Router, extract::State, routing::get};

/// Statistics routes; read only.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/statistics", get(get_statistics))
}

/// GET /api/statistics - school, class and fee-type rollups
pub async fn get_statistics(State(state): State<AppState>) -> ApiResult<Json<SchoolStatistics>> {
    Ok(Json(statistics::get_statistics(&state.db).await?))
}
