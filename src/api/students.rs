//! Student, obligation and class routes.

use super::{ApiJson, ApiResult, AppState, Confirmation};
use crate::{
    core::{
        agency::{self, WalletSummary},
        maintenance::{self, DeletionSummary},
        payment,
        statistics::{self, StudentSummary},
        student::{self, NewStudent, Obligations, StudentProfile},
    },
    entities::{payment_record, student as student_entity},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, put},
};
use serde::Deserialize;

/// Query of `GET /api/students`.
#[derive(Debug, Default, Deserialize)]
pub struct StudentQuery {
    /// Restrict to one class
    #[serde(default)]
    pub class_name: Option<String>,
}

/// Routes that only read.
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list))
        .route("/api/students/{id}", get(get_by_id))
        .route("/api/students/{id}/summary", get(summary))
        .route("/api/students/{id}/payments", get(payments))
        .route("/api/students/{id}/wallet", get(wallet))
        .route("/api/classes", get(list_classes))
}

/// Routes that change students or classes.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", axum::routing::post(create))
        .route("/api/students/{id}", put(update).delete(remove))
        .route("/api/students/{id}/obligations", put(set_obligations))
        .route("/api/classes/{name}", delete(delete_class))
}

/// GET /api/students - list students, optionally by class
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<StudentQuery>,
) -> ApiResult<Json<Vec<student_entity::Model>>> {
    let students = student::list_students(&state.db, query.class_name.as_deref()).await?;
    Ok(Json(students))
}

/// GET /api/students/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<student_entity::Model>> {
    Ok(Json(student::require_student(&state.db, id).await?))
}

/// POST /api/students
pub async fn create(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewStudent>,
) -> ApiResult<Json<student_entity::Model>> {
    let created =
        student::create_student(&state.db, payload, state.settings.fees.default_agency_fee).await?;
    Ok(Json(created))
}

/// PUT /api/students/{id} - class, name, gender and remark
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<StudentProfile>,
) -> ApiResult<Json<student_entity::Model>> {
    Ok(Json(student::update_student_profile(&state.db, id, payload).await?))
}

/// DELETE /api/students/{id}
pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<()>> {
    student::delete_student(&state.db, id).await?;
    Ok(Json(()))
}

/// PUT /api/students/{id}/obligations - overwrite the six owed amounts
pub async fn set_obligations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<Obligations>,
) -> ApiResult<Json<student_entity::Model>> {
    Ok(Json(student::set_obligations(&state.db, id, payload).await?))
}

/// GET /api/students/{id}/summary
pub async fn summary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StudentSummary>> {
    Ok(Json(statistics::student_summary(&state.db, id).await?))
}

/// GET /api/students/{id}/payments - newest first
pub async fn payments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<payment_record::Model>>> {
    student::require_student(&state.db, id).await?;
    Ok(Json(payment::list_payments(&state.db, id).await?))
}

/// GET /api/students/{id}/wallet
pub async fn wallet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<WalletSummary>> {
    Ok(Json(agency::wallet_summary(&state.db, id).await?))
}

/// GET /api/classes
pub async fn list_classes(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(student::list_classes(&state.db).await?))
}

/// DELETE /api/classes/{name} - body `{ "confirmed": true }`
pub async fn delete_class(
    State(state): State<AppState>,
    Path(name): Path<String>,
    confirmation: Confirmation,
) -> ApiResult<Json<DeletionSummary>> {
    let summary = maintenance::delete_class(&state.db, &name, confirmation.confirmed).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::errors::Result;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_student_lifecycle() -> Result<()> {
        let (app, _db) = test_app().await?;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/students",
            Some(json!({ "class_name": "三年1班", "student_name": "张三", "tuition_fee": 1000.0 })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["agency_fee"], 600.0);
        let id = created["id"].as_i64().unwrap_or_default();

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/students/{id}/obligations"),
            Some(json!({ "tuition_fee": 1200.0, "agency_fee": 500.0 })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["tuition_fee"], 1200.0);

        let (status, summary) =
            send(&app, Method::GET, &format!("/api/students/{id}/summary"), None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total_fee"], 1700.0);
        assert_eq!(summary["collection_rate"], "0.00%");

        let (status, _) =
            send(&app, Method::DELETE, &format!("/api/students/{id}"), None, true).await;
        assert_eq!(status, StatusCode::OK);

        let (status, err) =
            send(&app, Method::GET, &format!("/api/students/{id}"), None, false).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "student_not_found");
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_student_is_bad_request() -> Result<()> {
        let (app, _db) = test_app().await?;
        let body = json!({ "class_name": "三年1班", "student_name": "张三" });
        send(&app, Method::POST, "/api/students", Some(body.clone()), true).await;
        let (status, err) = send(&app, Method::POST, "/api/students", Some(body), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "duplicate_student");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_class_needs_confirmation() -> Result<()> {
        let (app, _db) = test_app().await?;
        send(
            &app,
            Method::POST,
            "/api/students",
            Some(json!({ "class_name": "一年1班", "student_name": "甲" })),
            true,
        )
        .await;

        let uri = "/api/classes/%E4%B8%80%E5%B9%B41%E7%8F%AD";
        let (status, err) = send(&app, Method::DELETE, uri, Some(json!({})), true).await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(err["details"]["operation"], "delete_class");

        let (status, summary) =
            send(&app, Method::DELETE, uri, Some(json!({ "confirmed": true })), true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["students"], 1);

        let (_, classes) = send(&app, Method::GET, "/api/classes", None, false).await;
        assert_eq!(classes, json!([]));
        Ok(())
    }
}
