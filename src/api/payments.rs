//! Payment routes.

use super::{ApiJson, ApiResult, AppState};
use crate::{
    core::payment::{
        self, BatchPaymentEntry, BatchPaymentResult, NewPayment, PaymentReceipt,
    },
    entities::{FeeType, payment_record},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post},
};
use chrono::NaiveDate;
use serde::Deserialize;

/// Body of `POST /api/payments`.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Paying student
    pub student_id: i64,
    /// Fee type identifier or label
    pub fee_type: String,
    /// Amount received
    pub amount: f64,
    /// Defaults to today
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Optional note
    #[serde(default)]
    pub remark: Option<String>,
}

/// Body of `POST /api/payments/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchPaymentRequest {
    /// Payments to record
    pub entries: Vec<BatchPaymentEntry>,
    /// Shared date, defaults to today
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Shared note
    #[serde(default)]
    pub remark: Option<String>,
}

/// Payment routes; all of them write.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments", post(create))
        .route("/api/payments/batch", post(create_batch))
        .route("/api/payments/{id}", delete(remove))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// POST /api/payments
pub async fn create(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PaymentRequest>,
) -> ApiResult<Json<PaymentReceipt>> {
    let fee_type: FeeType = payload.fee_type.parse()?;
    let receipt = payment::record_payment(
        &state.db,
        NewPayment {
            student_id: payload.student_id,
            fee_type,
            amount: payload.amount,
            payment_date: payload.payment_date.unwrap_or_else(today),
            remark: payload.remark,
        },
    )
    .await?;
    Ok(Json(receipt))
}

/// POST /api/payments/batch - partial success allowed
pub async fn create_batch(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<BatchPaymentRequest>,
) -> ApiResult<Json<BatchPaymentResult>> {
    let result = payment::batch_record_payments(
        &state.db,
        payload.entries,
        payload.payment_date.unwrap_or_else(today),
        payload.remark,
    )
    .await?;
    Ok(Json(result))
}

/// DELETE /api/payments/{id}
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<payment_record::Model>> {
    Ok(Json(payment::delete_payment(&state.db, id).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::errors::Result;
    use crate::test_utils::create_student_with_tuition;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_overspend_is_conflict_with_figures() -> Result<()> {
        let (app, db) = test_app().await?;
        let student = create_student_with_tuition(&db, "三年1班", "张三", 5000.0).await?;

        let (status, receipt) = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(json!({ "student_id": student.id, "fee_type": "学费", "amount": 3000.0 })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["remaining"], 2000.0);

        let (status, err) = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(json!({ "student_id": student.id, "fee_type": "tuition", "amount": 2500.0 })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "exceeds_obligation");
        assert_eq!(err["details"]["owed"], 5000.0);
        assert_eq!(err["details"]["already_paid"], 3000.0);
        assert_eq!(err["details"]["amount"], 2500.0);
        assert_eq!(err["details"]["would_be_total"], 5500.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_fee_type_and_bad_amount() -> Result<()> {
        let (app, db) = test_app().await?;
        let student = create_student_with_tuition(&db, "三年1班", "张三", 100.0).await?;

        let (status, err) = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(json!({ "student_id": student.id, "fee_type": "parking", "amount": 10.0 })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "unknown_fee_type");

        let (status, err) = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(json!({ "student_id": student.id, "fee_type": "tuition", "amount": -5.0 })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "invalid_amount");
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_and_delete() -> Result<()> {
        let (app, db) = test_app().await?;
        let student = create_student_with_tuition(&db, "三年1班", "张三", 100.0).await?;

        let (status, result) = send(
            &app,
            Method::POST,
            "/api/payments/batch",
            Some(json!({
                "payment_date": "2024-09-01",
                "entries": [
                    { "student_id": student.id, "fee_type": "tuition", "amount": 60.0 },
                    { "student_id": student.id, "fee_type": "tuition", "amount": 60.0 },
                    { "student_id": 999, "fee_type": "tuition", "amount": 1.0 }
                ]
            })),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["succeeded"], 1);
        assert_eq!(result["failed"], 2);
        assert_eq!(result["results"][1]["error"]["code"], "exceeds_obligation");
        assert_eq!(result["results"][2]["error"]["code"], "student_not_found");

        let id = result["results"][0]["receipt"]["record"]["id"]
            .as_i64()
            .unwrap_or_default();
        let (status, _) = send(&app, Method::DELETE, &format!("/api/payments/{id}"), None, true).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, &format!("/api/payments/{id}"), None, true).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
