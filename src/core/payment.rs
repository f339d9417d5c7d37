//! Payment ledger - records money received against a student's obligations.
//!
//! The ledger is append-only: payments are inserted or deleted, never edited.
//! Paid totals are always re-derived by summing rows. Every insert is guarded so
//! that, for a given (student, fee type), the paid total never exceeds the owed
//! amount at the time of the insert. The guard is a single conditional
//! `INSERT ... SELECT ... WHERE` statement, so two concurrent payments cannot
//! both pass on a stale total.
//!
//! Agency-fee payments additionally move `students.agency_paid` by the same
//! amount inside the same transaction.

use crate::{
    core::{money, student::require_student},
    entities::{FeeType, PaymentRecord, Student, payment_record, student},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{
    QueryOrder, QuerySelect, Statement, TransactionTrait, Value, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

/// Per-fee-type paid sums for one student.
pub type PaidTotals = BTreeMap<FeeType, f64>;

/// Input for [`record_payment`].
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Paying student
    pub student_id: i64,
    /// Fee category
    pub fee_type: FeeType,
    /// Amount received, must be positive
    pub amount: f64,
    /// Date the money was received
    pub payment_date: NaiveDate,
    /// Optional note
    pub remark: Option<String>,
}

/// Result of a successful [`record_payment`].
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    /// The inserted ledger row
    pub record: payment_record::Model,
    /// Owed amount for the fee type
    pub owed: f64,
    /// Paid total for the fee type including this payment
    pub total_paid: f64,
    /// `owed - total_paid`
    pub remaining: f64,
}

/// One requested payment in a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchPaymentEntry {
    /// Paying student
    pub student_id: i64,
    /// Fee category as entered; validated per entry
    pub fee_type: String,
    /// Amount received
    pub amount: f64,
}

/// Why a batch entry failed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntryError {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable message including any figures
    pub message: String,
}

/// Outcome of one batch entry.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntryResult {
    /// Position in the request
    pub index: usize,
    /// Student the entry targeted
    pub student_id: i64,
    /// Fee type as entered
    pub fee_type: String,
    /// Amount as entered
    pub amount: f64,
    /// Present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PaymentReceipt>,
    /// Present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchEntryError>,
}

impl BatchEntryResult {
    /// True when the payment was recorded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.receipt.is_some()
    }
}

/// Result of [`batch_record_payments`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchPaymentResult {
    /// Per-entry outcomes in request order
    pub results: Vec<BatchEntryResult>,
    /// Number of recorded payments
    pub succeeded: usize,
    /// Number of rejected entries
    pub failed: usize,
}

/// Sum of payments for one (student, fee type).
pub async fn paid_total<C>(db: &C, student_id: i64, fee_type: FeeType) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<f64>> = PaymentRecord::find()
        .select_only()
        .column_as(payment_record::Column::Amount.sum(), "total")
        .filter(payment_record::Column::StudentId.eq(student_id))
        .filter(payment_record::Column::FeeType.eq(fee_type))
        .into_tuple::<Option<f64>>()
        .one(db)
        .await?;
    Ok(money::round_cents(total.flatten().unwrap_or(0.0)))
}

/// Per-fee-type payment sums for one student. Fee types without payments are 0.
pub async fn paid_totals<C>(db: &C, student_id: i64) -> Result<PaidTotals>
where
    C: ConnectionTrait,
{
    let rows: Vec<(FeeType, f64)> = PaymentRecord::find()
        .select_only()
        .column(payment_record::Column::FeeType)
        .column_as(payment_record::Column::Amount.sum(), "total")
        .filter(payment_record::Column::StudentId.eq(student_id))
        .group_by(payment_record::Column::FeeType)
        .into_tuple::<(FeeType, f64)>()
        .all(db)
        .await?;

    let mut totals: PaidTotals = FeeType::ALL.iter().map(|ft| (*ft, 0.0)).collect();
    for (fee_type, total) in rows {
        totals.insert(fee_type, money::round_cents(total));
    }
    Ok(totals)
}

/// Per-fee-type payment sums for every student that has payments.
pub async fn paid_totals_by_student<C>(db: &C) -> Result<HashMap<i64, PaidTotals>>
where
    C: ConnectionTrait,
{
    let rows: Vec<(i64, FeeType, f64)> = PaymentRecord::find()
        .select_only()
        .column(payment_record::Column::StudentId)
        .column(payment_record::Column::FeeType)
        .column_as(payment_record::Column::Amount.sum(), "total")
        .group_by(payment_record::Column::StudentId)
        .group_by(payment_record::Column::FeeType)
        .into_tuple::<(i64, FeeType, f64)>()
        .all(db)
        .await?;

    let mut by_student: HashMap<i64, PaidTotals> = HashMap::new();
    for (student_id, fee_type, total) in rows {
        by_student
            .entry(student_id)
            .or_insert_with(|| FeeType::ALL.iter().map(|ft| (*ft, 0.0)).collect())
            .insert(fee_type, money::round_cents(total));
    }
    Ok(by_student)
}

/// Retrieves all payments of a student, newest first.
pub async fn list_payments<C>(db: &C, student_id: i64) -> Result<Vec<payment_record::Model>>
where
    C: ConnectionTrait,
{
    PaymentRecord::find()
        .filter(payment_record::Column::StudentId.eq(student_id))
        .order_by_desc(payment_record::Column::PaymentDate)
        .order_by_desc(payment_record::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a payment by id.
pub async fn get_payment_by_id<C>(db: &C, payment_id: i64) -> Result<Option<payment_record::Model>>
where
    C: ConnectionTrait,
{
    PaymentRecord::find_by_id(payment_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Moves the agency wallet counter by `delta` with a single UPDATE.
pub(crate) async fn adjust_agency_paid<C>(db: &C, student_id: i64, delta: f64) -> Result<()>
where
    C: ConnectionTrait,
{
    Student::update_many()
        .col_expr(
            student::Column::AgencyPaid,
            Expr::col(student::Column::AgencyPaid).add(delta),
        )
        .col_expr(student::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(student::Column::Id.eq(student_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Inserts the payment only if the resulting total stays within the owed amount.
/// Returns the new row id, or `None` when the guard rejected the insert.
async fn guarded_insert<C>(db: &C, payment: &NewPayment) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let owed_column = payment.fee_type.owed_column_name();
    let sql = format!(
        "INSERT INTO payment_records (student_id, fee_type, amount, payment_date, remark, created_at) \
         SELECT ?, ?, ?, ?, ?, ? \
         WHERE ROUND((SELECT COALESCE(SUM(amount), 0) FROM payment_records \
                      WHERE student_id = ? AND fee_type = ?) + ?, 2) \
            <= ROUND((SELECT {owed_column} FROM students WHERE id = ?), 2)"
    );
    let values: Vec<Value> = vec![
        payment.student_id.into(),
        payment.fee_type.as_str().into(),
        payment.amount.into(),
        payment.payment_date.into(),
        payment.remark.clone().into(),
        chrono::Utc::now().into(),
        payment.student_id.into(),
        payment.fee_type.as_str().into(),
        payment.amount.into(),
        payment.student_id.into(),
    ];

    let result = db
        .execute(Statement::from_sql_and_values(
            db.get_database_backend(),
            sql,
            values,
        ))
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(i64::try_from(result.last_insert_id())?))
}

/// Records a payment after checking it against the owed amount.
///
/// Runs in its own transaction; called on an open transaction it nests as a
/// savepoint, so the caller's rollback also drops the payment.
///
/// # Errors
/// - [`Error::InvalidAmount`] when the amount is not a positive number
/// - [`Error::StudentNotFound`] when the student does not exist
/// - [`Error::ExceedsObligation`] when `already_paid + amount > owed`; nothing is written
#[instrument(skip(db, payment), fields(student_id = payment.student_id, fee_type = %payment.fee_type, amount = payment.amount))]
pub async fn record_payment<C>(db: &C, payment: NewPayment) -> Result<PaymentReceipt>
where
    C: ConnectionTrait + TransactionTrait,
{
    let amount = money::validate_positive_amount(payment.amount)?;
    let payment = NewPayment {
        amount,
        remark: payment
            .remark
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        ..payment
    };

    let txn = db.begin().await?;

    let student = require_student(&txn, payment.student_id).await?;
    let owed = money::round_cents(student.owed(payment.fee_type));
    let already_paid = paid_total(&txn, payment.student_id, payment.fee_type).await?;
    let would_be_total = money::round_cents(already_paid + amount);

    if money::exceeds(would_be_total, owed) {
        warn!(owed, already_paid, would_be_total, "Payment rejected: exceeds obligation");
        return Err(Error::ExceedsObligation {
            fee_type: payment.fee_type,
            owed,
            already_paid,
            amount,
            would_be_total,
        });
    }

    let Some(record_id) = guarded_insert(&txn, &payment).await? else {
        // Another writer got in between the read and the insert
        let already_paid = paid_total(&txn, payment.student_id, payment.fee_type).await?;
        warn!(owed, already_paid, "Payment rejected by insert guard");
        return Err(Error::ExceedsObligation {
            fee_type: payment.fee_type,
            owed,
            already_paid,
            amount,
            would_be_total: money::round_cents(already_paid + amount),
        });
    };

    if payment.fee_type == FeeType::Agency {
        adjust_agency_paid(&txn, payment.student_id, amount).await?;
    }

    let record = PaymentRecord::find_by_id(record_id)
        .one(&txn)
        .await?
        .ok_or(Error::PaymentNotFound { id: record_id })?;

    txn.commit().await?;

    info!(payment_id = record.id, total_paid = would_be_total, "Payment recorded");
    Ok(PaymentReceipt {
        record,
        owed,
        total_paid: would_be_total,
        remaining: money::round_cents(owed - would_be_total),
    })
}

/// Deletes a payment. Removing money can only lower a paid total, so no
/// re-validation is needed. Agency payments also lower the wallet counter.
#[instrument(skip(db))]
pub async fn delete_payment(db: &DatabaseConnection, payment_id: i64) -> Result<payment_record::Model> {
    let txn = db.begin().await?;

    let record = get_payment_by_id(&txn, payment_id)
        .await?
        .ok_or(Error::PaymentNotFound { id: payment_id })?;

    PaymentRecord::delete_by_id(payment_id).exec(&txn).await?;
    if record.fee_type == FeeType::Agency {
        adjust_agency_paid(&txn, record.student_id, -record.amount).await?;
    }

    txn.commit().await?;
    info!(student_id = record.student_id, "Payment deleted");
    Ok(record)
}

/// Records several payments sharing one date and remark.
///
/// Each entry runs through [`record_payment`] in its own transaction, so one
/// rejected entry leaves the others untouched.
#[instrument(skip(db, entries), fields(entries = entries.len()))]
pub async fn batch_record_payments(
    db: &DatabaseConnection,
    entries: Vec<BatchPaymentEntry>,
    payment_date: NaiveDate,
    remark: Option<String>,
) -> Result<BatchPaymentResult> {
    let mut results = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let outcome = match entry.fee_type.parse::<FeeType>() {
            Ok(fee_type) => {
                record_payment(
                    db,
                    NewPayment {
                        student_id: entry.student_id,
                        fee_type,
                        amount: entry.amount,
                        payment_date,
                        remark: remark.clone(),
                    },
                )
                .await
            }
            Err(e) => Err(e),
        };

        let (receipt, error) = match outcome {
            Ok(receipt) => (Some(receipt), None),
            Err(e @ (Error::Database(_) | Error::Io(_))) => return Err(e),
            Err(e) => {
                debug!(index, error = %e, "Batch entry rejected");
                (
                    None,
                    Some(BatchEntryError {
                        code: e.code(),
                        message: e.to_string(),
                    }),
                )
            }
        };

        results.push(BatchEntryResult {
            index,
            student_id: entry.student_id,
            fee_type: entry.fee_type,
            amount: entry.amount,
            receipt,
            error,
        });
    }

    let succeeded = results.iter().filter(|r| r.succeeded()).count();
    let failed = results.len() - succeeded;
    info!(succeeded, failed, "Batch payments processed");
    Ok(BatchPaymentResult {
        results,
        succeeded,
        failed,
    })
}
