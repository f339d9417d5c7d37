//! Shared test utilities for the ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating students, payments and deductions with sensible defaults.

use crate::{
    core::{
        agency::{self, DeductionReceipt, NewDeduction},
        payment::{self, NewPayment, PaymentReceipt},
        student::{self, NewStudent},
    },
    entities::{self, AgencyItem, FeeType, Student},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, prelude::*, sea_query::Expr};

/// Default agency allowance used by the helpers.
pub const TEST_AGENCY_FEE: f64 = 600.0;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A fixed date so assertions do not depend on the clock.
#[must_use]
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap_or_default()
}

/// Creates a student who owes nothing except the default agency allowance.
pub async fn create_test_student(
    db: &DatabaseConnection,
    class_name: &str,
    student_name: &str,
) -> Result<entities::student::Model> {
    student::create_student(
        db,
        NewStudent {
            class_name: class_name.to_string(),
            student_name: student_name.to_string(),
            ..Default::default()
        },
        TEST_AGENCY_FEE,
    )
    .await
}

/// Creates a student owing the given tuition plus the default agency allowance.
pub async fn create_student_with_tuition(
    db: &DatabaseConnection,
    class_name: &str,
    student_name: &str,
    tuition_fee: f64,
) -> Result<entities::student::Model> {
    student::create_student(
        db,
        NewStudent {
            class_name: class_name.to_string(),
            student_name: student_name.to_string(),
            tuition_fee,
            ..Default::default()
        },
        TEST_AGENCY_FEE,
    )
    .await
}

/// Records a payment dated [`test_date`] without a remark.
pub async fn pay(
    db: &DatabaseConnection,
    student_id: i64,
    fee_type: FeeType,
    amount: f64,
) -> Result<PaymentReceipt> {
    payment::record_payment(
        db,
        NewPayment {
            student_id,
            fee_type,
            amount,
            payment_date: test_date(),
            remark: None,
        },
    )
    .await
}

/// Records a uniform purchase against a student's wallet.
pub async fn deduct(
    db: &DatabaseConnection,
    student_id: i64,
    amount: f64,
) -> Result<DeductionReceipt> {
    agency::add_deduction(
        db,
        NewDeduction {
            student_id,
            item_type: AgencyItem::Uniform,
            amount,
            item_date: test_date(),
            remark: None,
        },
    )
    .await
}

/// Overwrites the wallet counter directly, bypassing the payment ledger.
/// Used to simulate a counter that drifted from the ledger.
pub async fn set_agency_paid(db: &DatabaseConnection, student_id: i64, value: f64) -> Result<()> {
    Student::update_many()
        .col_expr(entities::student::Column::AgencyPaid, Expr::value(value))
        .filter(entities::student::Column::Id.eq(student_id))
        .exec(db)
        .await?;
    Ok(())
}
