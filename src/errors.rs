//! Unified error types and result handling.
//!
//! Every core operation returns [`Result`]. Variants are grouped by [`ErrorKind`]
//! so outer layers can decide how to present a rejection without matching on
//! every variant.

use crate::entities::FeeType;
use sea_orm::DbErr;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or value, rejected before any state was read
    Validation,
    /// Referenced student or record does not exist
    NotFound,
    /// Write would break a ledger balance rule
    Invariant,
    /// Irreversible operation called without explicit confirmation
    ConfirmationRequired,
    /// Storage or environment failure the core cannot recover from
    Internal,
}

/// Application error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Generic input validation failure
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
    },

    /// Amount is zero, negative, or not a finite number
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Fee type string outside the recognised set
    #[error("Unknown fee type: {value}")]
    UnknownFeeType {
        /// The rejected value
        value: String,
    },

    /// Agency deduction item outside the recognised set
    #[error("Unknown agency fee item: {value}")]
    UnknownAgencyItem {
        /// The rejected value
        value: String,
    },

    /// Expense category outside the recognised set
    #[error("Unknown expense category: {value}")]
    UnknownExpenseCategory {
        /// The rejected value
        value: String,
    },

    /// Expense item not allowed for its category
    #[error("Expense item '{item}' is not allowed in category '{category}'")]
    UnknownExpenseItem {
        /// Category the item was filed under
        category: String,
        /// The rejected item
        item: String,
    },

    /// A student with the same class and name already exists
    #[error("Student '{student_name}' already exists in class '{class_name}'")]
    DuplicateStudent {
        /// Class name
        class_name: String,
        /// Student name
        student_name: String,
    },

    /// Student id does not exist
    #[error("Student not found: {id}")]
    StudentNotFound {
        /// Requested id
        id: i64,
    },

    /// Payment record id does not exist
    #[error("Payment record not found: {id}")]
    PaymentNotFound {
        /// Requested id
        id: i64,
    },

    /// Agency fee deduction id does not exist
    #[error("Agency fee deduction not found: {id}")]
    DeductionNotFound {
        /// Requested id
        id: i64,
    },

    /// Expense record id does not exist
    #[error("Expense record not found: {id}")]
    ExpenseNotFound {
        /// Requested id
        id: i64,
    },

    /// Payment would push the paid total for a fee type above the owed amount
    #[error(
        "Payment exceeds {fee_type} obligation: owed {owed:.2}, already paid {already_paid:.2}, \
         paying {amount:.2} would total {would_be_total:.2}"
    )]
    ExceedsObligation {
        /// Fee type being paid
        fee_type: FeeType,
        /// Owed amount for the fee type
        owed: f64,
        /// Sum of existing payments for the fee type
        already_paid: f64,
        /// Attempted payment
        amount: f64,
        /// `already_paid + amount`
        would_be_total: f64,
    },

    /// Deduction would push total deductions above the wallet capacity
    #[error(
        "Deduction exceeds agency fee balance: capacity {capacity:.2}, already deducted \
         {already_deducted:.2}, remaining {remaining:.2}, attempted {amount:.2}"
    )]
    ExceedsWalletCapacity {
        /// Wallet capacity (`Student.agency_fee`)
        capacity: f64,
        /// Sum of existing deductions
        already_deducted: f64,
        /// Attempted deduction
        amount: f64,
        /// `capacity - already_deducted`
        remaining: f64,
    },

    /// Irreversible operation attempted without `confirmed = true`
    #[error("Operation '{operation}' is irreversible and requires explicit confirmation")]
    ConfirmationRequired {
        /// Name of the guarded operation
        operation: &'static str,
    },

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Integer conversion failure (e.g. row ids)
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Classifies the error for presentation.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::UnknownFeeType { .. }
            | Self::UnknownAgencyItem { .. }
            | Self::UnknownExpenseCategory { .. }
            | Self::UnknownExpenseItem { .. }
            | Self::DuplicateStudent { .. } => ErrorKind::Validation,
            Self::StudentNotFound { .. }
            | Self::PaymentNotFound { .. }
            | Self::DeductionNotFound { .. }
            | Self::ExpenseNotFound { .. } => ErrorKind::NotFound,
            Self::ExceedsObligation { .. } | Self::ExceedsWalletCapacity { .. } => {
                ErrorKind::Invariant
            }
            Self::ConfirmationRequired { .. } => ErrorKind::ConfirmationRequired,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::TryFromInt(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable machine-readable code for the variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::Validation { .. } => "validation_error",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::UnknownFeeType { .. } => "unknown_fee_type",
            Self::UnknownAgencyItem { .. } => "unknown_agency_item",
            Self::UnknownExpenseCategory { .. } => "unknown_expense_category",
            Self::UnknownExpenseItem { .. } => "unknown_expense_item",
            Self::DuplicateStudent { .. } => "duplicate_student",
            Self::StudentNotFound { .. } => "student_not_found",
            Self::PaymentNotFound { .. } => "payment_not_found",
            Self::DeductionNotFound { .. } => "deduction_not_found",
            Self::ExpenseNotFound { .. } => "expense_not_found",
            Self::ExceedsObligation { .. } => "exceeds_obligation",
            Self::ExceedsWalletCapacity { .. } => "exceeds_wallet_capacity",
            Self::ConfirmationRequired { .. } => "confirmation_required",
            Self::Database(_) => "database_error",
            Self::Io(_) => "io_error",
            Self::TryFromInt(_) => "internal_error",
        }
    }

    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
