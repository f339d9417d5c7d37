//! Destructive bulk operations: deleting a whole class and wiping everything.
//!
//! Both run in one transaction and refuse to start without confirmation.

use crate::{
    entities::{
        AgencyFeeDeduction, ExpenseRecord, PaymentRecord, Student, agency_fee_deduction,
        payment_record, student,
    },
    errors::{Error, Result},
};
use sea_orm::{QuerySelect, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Row counts removed by a maintenance operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    /// Students removed
    pub students: u64,
    /// Payment records removed
    pub payments: u64,
    /// Agency deductions removed
    pub deductions: u64,
    /// Expense records removed
    pub expenses: u64,
}

/// Deletes every student of a class together with their ledger rows.
///
/// # Errors
/// [`Error::ConfirmationRequired`] unless `confirmed` is true.
#[instrument(skip(db))]
pub async fn delete_class(
    db: &DatabaseConnection,
    class_name: &str,
    confirmed: bool,
) -> Result<DeletionSummary> {
    if !confirmed {
        warn!("Class deletion rejected: not confirmed");
        return Err(Error::ConfirmationRequired {
            operation: "delete_class",
        });
    }

    let txn = db.begin().await?;

    let ids: Vec<i64> = Student::find()
        .select_only()
        .column(student::Column::Id)
        .filter(student::Column::ClassName.eq(class_name.trim()))
        .into_tuple::<i64>()
        .all(&txn)
        .await?;

    let deductions = AgencyFeeDeduction::delete_many()
        .filter(agency_fee_deduction::Column::StudentId.is_in(ids.clone()))
        .exec(&txn)
        .await?
        .rows_affected;
    let payments = PaymentRecord::delete_many()
        .filter(payment_record::Column::StudentId.is_in(ids.clone()))
        .exec(&txn)
        .await?
        .rows_affected;
    let students = Student::delete_many()
        .filter(student::Column::Id.is_in(ids))
        .exec(&txn)
        .await?
        .rows_affected;

    txn.commit().await?;

    info!(students, payments, deductions, "Class deleted");
    Ok(DeletionSummary {
        students,
        payments,
        deductions,
        expenses: 0,
    })
}

/// Deletes all students, ledger rows and expenses.
///
/// # Errors
/// [`Error::ConfirmationRequired`] unless `confirmed` is true.
#[instrument(skip(db))]
pub async fn wipe_all_data(db: &DatabaseConnection, confirmed: bool) -> Result<DeletionSummary> {
    if !confirmed {
        warn!("Wipe rejected: not confirmed");
        return Err(Error::ConfirmationRequired {
            operation: "wipe_all_data",
        });
    }

    let txn = db.begin().await?;
    let deductions = AgencyFeeDeduction::delete_many().exec(&txn).await?.rows_affected;
    let payments = PaymentRecord::delete_many().exec(&txn).await?.rows_affected;
    let students = Student::delete_many().exec(&txn).await?.rows_affected;
    let expenses = ExpenseRecord::delete_many().exec(&txn).await?.rows_affected;
    txn.commit().await?;

    warn!(students, payments, deductions, expenses, "All data wiped");
    Ok(DeletionSummary {
        students,
        payments,
        deductions,
        expenses,
    })
}
