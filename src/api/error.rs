//! Error to HTTP response mapping.
//!
//! Every rejection is rendered as `{ "code", "message", "details" }`. Status
//! codes follow [`ErrorKind`]; `details` carries the figures of an invariant
//! violation so a client can explain it without parsing the message.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

/// Handler result alias
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl ApiError {
    /// Missing or wrong admin token.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: "A valid x-admin-token header is required".to_string(),
            details: None,
        }
    }

    /// Request body that could not be read as the expected JSON.
    #[must_use]
    pub fn invalid_body(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code: "invalid_body",
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status of the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Invariant => StatusCode::CONFLICT,
        ErrorKind::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details_for(err: &Error) -> Option<Value> {
    match err {
        Error::ExceedsObligation {
            fee_type,
            owed,
            already_paid,
            amount,
            would_be_total,
        } => Some(json!({
            "fee_type": fee_type,
            "owed": owed,
            "already_paid": already_paid,
            "amount": amount,
            "would_be_total": would_be_total,
            "remaining": crate::core::money::round_cents(owed - already_paid),
        })),
        Error::ExceedsWalletCapacity {
            capacity,
            already_deducted,
            amount,
            remaining,
        } => Some(json!({
            "capacity": capacity,
            "already_deducted": already_deducted,
            "amount": amount,
            "remaining": remaining,
        })),
        Error::InvalidAmount { amount } => Some(json!({ "amount": amount })),
        Error::ConfirmationRequired { operation } => Some(json!({ "operation": operation })),
        _ => None,
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        let message = if kind == ErrorKind::Internal {
            tracing::error!(error = %err, "Internal error while handling request");
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        Self {
            status: status_for(kind),
            code: err.code(),
            details: details_for(&err),
            message,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_body(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
            details: self.details.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}
