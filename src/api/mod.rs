//! HTTP API over the ledger core.
//!
//! | Path | Methods | Gate |
//! |------|---------|------|
//! | /health | GET | none |
//! | /api/students, /api/students/{id} | GET, POST, PUT, DELETE | writes |
//! | /api/students/{id}/obligations | PUT | admin |
//! | /api/students/{id}/summary, /payments, /wallet | GET | none |
//! | /api/classes, /api/classes/{name} | GET, DELETE | writes |
//! | /api/payments, /api/payments/batch, /api/payments/{id} | POST, DELETE | admin |
//! | /api/agency/deductions, /api/agency/deductions/{id} | POST, DELETE | admin |
//! | /api/agency/reconciliation | GET | none |
//! | /api/expenses, /api/expenses/{id}, /api/expenses/summary | GET, POST, DELETE | writes |
//! | /api/statistics | GET | none |
//! | /api/transfer/import, /api/transfer/export | POST, GET | import |
//! | /api/admin/promote, /api/admin/wipe | POST | admin |
//!
//! Mutating routes sit behind [`require_admin`].

pub mod admin;
pub mod agency;
pub mod error;
pub mod expenses;
pub mod payments;
pub mod statistics;
pub mod students;
pub mod transfer;

use crate::config::{auth, settings::Settings};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub use error::{ApiError, ApiResult};

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Token mutating routes require; `None` leaves them open
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Bundles the connection, settings and admin token.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings, admin_token: Option<String>) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            admin_token: admin_token.map(Arc::from),
        }
    }
}

/// JSON body extractor whose rejections use the [`ApiError`] envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Body of irreversible operations.
///
/// An empty body reads as unconfirmed, so the operation answers with
/// `confirmation_required` rather than a body error.
#[derive(Debug, Default, Deserialize)]
pub struct Confirmation {
    /// Must be true for the operation to run
    #[serde(default)]
    pub confirmed: bool,
}

impl<S> FromRequest<S> for Confirmation
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| ApiError::invalid_body(e.status(), e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::invalid_body(StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Rejects requests whose `x-admin-token` does not match the configured token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if auth::is_authenticated(state.admin_token.as_deref(), presented) {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated write");
        ApiError::unauthorized().into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let reads = Router::new()
        .merge(students::read_routes())
        .merge(agency::read_routes())
        .merge(expenses::read_routes())
        .merge(statistics::routes())
        .merge(transfer::read_routes());

    let writes = Router::new()
        .merge(students::write_routes())
        .merge(payments::routes())
        .merge(agency::write_routes())
        .merge(expenses::write_routes())
        .merge(transfer::write_routes())
        .merge(admin::routes())
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .merge(reads)
        .merge(writes)
        .with_state(state)
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::test_support::*;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_health_is_open() -> crate::errors::Result<()> {
        let (app, _db) = test_app().await?;
        let (status, body) = send(&app, Method::GET, "/health", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_require_token() -> crate::errors::Result<()> {
        let (app, _db) = test_app().await?;
        let body = serde_json::json!({ "class_name": "三年1班", "student_name": "张三" });

        let (status, err) = send(&app, Method::POST, "/api/students", Some(body.clone()), false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["code"], "unauthorized");

        let (status, _) = send(&app, Method::POST, "/api/students", Some(body), true).await;
        assert_eq!(status, StatusCode::OK);

        // Reads stay open
        let (status, list) = send(&app, Method::GET, "/api/students", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_body_rejections_use_error_envelope() -> crate::errors::Result<()> {
        let (app, _db) = test_app().await?;

        let bad_shape = serde_json::json!({ "student_id": "abc" });
        let (status, err) = send(&app, Method::POST, "/api/payments", Some(bad_shape), true).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["code"], "invalid_body");
        assert!(err["message"].is_string());

        let (status, err) = send(&app, Method::POST, "/api/payments", None, true).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err["code"], "invalid_body");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_confirmation_body_is_unconfirmed() -> crate::errors::Result<()> {
        let (app, _db) = test_app().await?;

        let (status, err) = send(&app, Method::POST, "/api/admin/wipe", None, true).await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(err["code"], "confirmation_required");

        let uri = "/api/classes/%E4%B8%89%E5%B9%B41%E7%8F%AD";
        let (status, err) = send(&app, Method::DELETE, uri, None, true).await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(err["code"], "confirmation_required");
        Ok(())
    }
}
