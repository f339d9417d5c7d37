//! Agency-fee wallet - the prepaid "代办费" category and its itemised deductions.
//!
//! Money enters the wallet through the payment ledger (`FeeType::Agency`), which
//! also moves the `students.agency_paid` counter. Deductions spend it down.
//!
//! Two ceilings exist and they are deliberately different:
//! - payments in are capped by the capacity (`students.agency_fee`);
//! - deductions are capped by the same capacity, not by what was actually paid
//!   in, so purchases can be recorded before the wallet is fully funded.
//!
//! Accordingly the reported `balance` is `capacity - deducted`. The stricter
//! `funded_balance = paid_in - deducted` is reported next to it and may be
//! negative while a wallet is underfunded.

use crate::{
    core::{money, student::require_student},
    entities::{AgencyFeeDeduction, AgencyItem, FeeType, Student, agency_fee_deduction},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, QuerySelect, Statement, TransactionTrait, Value, prelude::*};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Input for [`add_deduction`].
#[derive(Debug, Clone)]
pub struct NewDeduction {
    /// Student whose wallet is charged
    pub student_id: i64,
    /// What was bought
    pub item_type: AgencyItem,
    /// Amount, must be positive
    pub amount: f64,
    /// Purchase date
    pub item_date: NaiveDate,
    /// Optional note
    pub remark: Option<String>,
}

/// Result of a successful [`add_deduction`].
#[derive(Debug, Clone, Serialize)]
pub struct DeductionReceipt {
    /// The inserted row
    pub deduction: agency_fee_deduction::Model,
    /// Wallet capacity
    pub capacity: f64,
    /// Deductions including this one
    pub total_deducted: f64,
    /// `capacity - total_deducted`
    pub balance: f64,
}

/// Full view of one student's wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    /// Student id
    pub student_id: i64,
    /// Wallet capacity (`students.agency_fee`)
    pub capacity: f64,
    /// Money paid in according to the wallet counter
    pub paid_in: f64,
    /// Money paid in according to the payment ledger
    pub ledger_paid_in: f64,
    /// Sum of deductions
    pub deducted: f64,
    /// `capacity - deducted`
    pub balance: f64,
    /// `paid_in - deducted`
    pub funded_balance: f64,
    /// Deductions, newest first
    pub deductions: Vec<agency_fee_deduction::Model>,
}

/// Comparison of the wallet counter with the agency payment ledger.
#[derive(Debug, Clone, Serialize)]
pub struct AgencyReconciliation {
    /// Student id
    pub student_id: i64,
    /// Class name
    pub class_name: String,
    /// Student name
    pub student_name: String,
    /// `students.agency_paid`
    pub counter: f64,
    /// Sum of agency payments in the ledger
    pub ledger_sum: f64,
}

impl AgencyReconciliation {
    /// True when counter and ledger agree to the cent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        money::round_cents(self.counter) == money::round_cents(self.ledger_sum)
    }
}

/// Sum of deductions for one student.
pub async fn total_deducted<C>(db: &C, student_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<f64>> = AgencyFeeDeduction::find()
        .select_only()
        .column_as(agency_fee_deduction::Column::Amount.sum(), "total")
        .filter(agency_fee_deduction::Column::StudentId.eq(student_id))
        .into_tuple::<Option<f64>>()
        .one(db)
        .await?;
    Ok(money::round_cents(total.flatten().unwrap_or(0.0)))
}

/// Deductions of one student, newest first.
pub async fn list_deductions<C>(
    db: &C,
    student_id: i64,
) -> Result<Vec<agency_fee_deduction::Model>>
where
    C: ConnectionTrait,
{
    AgencyFeeDeduction::find()
        .filter(agency_fee_deduction::Column::StudentId.eq(student_id))
        .order_by_desc(agency_fee_deduction::Column::ItemDate)
        .order_by_desc(agency_fee_deduction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn guarded_insert<C>(db: &C, deduction: &NewDeduction) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let sql = "INSERT INTO agency_fee_deductions (student_id, item_type, amount, item_date, remark, created_at) \
               SELECT ?, ?, ?, ?, ?, ? \
               WHERE ROUND((SELECT COALESCE(SUM(amount), 0) FROM agency_fee_deductions \
                            WHERE student_id = ?) + ?, 2) \
                  <= ROUND((SELECT agency_fee FROM students WHERE id = ?), 2)";
    let values: Vec<Value> = vec![
        deduction.student_id.into(),
        deduction.item_type.as_str().into(),
        deduction.amount.into(),
        deduction.item_date.into(),
        deduction.remark.clone().into(),
        chrono::Utc::now().into(),
        deduction.student_id.into(),
        deduction.amount.into(),
        deduction.student_id.into(),
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

/// Records a deduction against the wallet.
///
/// # Errors
/// - [`Error::InvalidAmount`] when the amount is not a positive number
/// - [`Error::StudentNotFound`] when the student does not exist
/// - [`Error::ExceedsWalletCapacity`] when deductions would exceed the capacity
#[instrument(skip(db, deduction), fields(student_id = deduction.student_id, item = %deduction.item_type, amount = deduction.amount))]
pub async fn add_deduction(
    db: &DatabaseConnection,
    deduction: NewDeduction,
) -> Result<DeductionReceipt> {
    let amount = money::validate_positive_amount(deduction.amount)?;
    let deduction = NewDeduction {
        amount,
        remark: deduction
            .remark
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        ..deduction
    };

    let txn = db.begin().await?;

    let student = require_student(&txn, deduction.student_id).await?;
    let capacity = money::round_cents(student.agency_fee);
    let already_deducted = total_deducted(&txn, deduction.student_id).await?;

    if money::exceeds(already_deducted + amount, capacity) {
        warn!(capacity, already_deducted, "Deduction rejected: exceeds wallet capacity");
        return Err(Error::ExceedsWalletCapacity {
            capacity,
            already_deducted,
            amount,
            remaining: money::round_cents(capacity - already_deducted),
        });
    }

    let Some(deduction_id) = guarded_insert(&txn, &deduction).await? else {
        let already_deducted = total_deducted(&txn, deduction.student_id).await?;
        warn!(capacity, already_deducted, "Deduction rejected by insert guard");
        return Err(Error::ExceedsWalletCapacity {
            capacity,
            already_deducted,
            amount,
            remaining: money::round_cents(capacity - already_deducted),
        });
    };

    let inserted = AgencyFeeDeduction::find_by_id(deduction_id)
        .one(&txn)
        .await?
        .ok_or(Error::DeductionNotFound { id: deduction_id })?;

    txn.commit().await?;

    let total_deducted = money::round_cents(already_deducted + amount);
    info!(deduction_id, total_deducted, "Deduction recorded");
    Ok(DeductionReceipt {
        deduction: inserted,
        capacity,
        total_deducted,
        balance: money::round_cents(capacity - total_deducted),
    })
}

/// Deletes a deduction, returning the money to the wallet.
#[instrument(skip(db))]
pub async fn remove_deduction(
    db: &DatabaseConnection,
    deduction_id: i64,
) -> Result<agency_fee_deduction::Model> {
    let deduction = AgencyFeeDeduction::find_by_id(deduction_id)
        .one(db)
        .await?
        .ok_or(Error::DeductionNotFound { id: deduction_id })?;

    AgencyFeeDeduction::delete_by_id(deduction_id).exec(db).await?;
    info!(student_id = deduction.student_id, "Deduction removed");
    Ok(deduction)
}

/// Builds the wallet view for one student.
pub async fn wallet_summary<C>(db: &C, student_id: i64) -> Result<WalletSummary>
where
    C: ConnectionTrait,
{
    let student = require_student(db, student_id).await?;
    let ledger_paid_in = crate::core::payment::paid_total(db, student_id, FeeType::Agency).await?;
    let deductions = list_deductions(db, student_id).await?;
    let deducted = money::round_cents(deductions.iter().map(|d| d.amount).sum());

    let capacity = money::round_cents(student.agency_fee);
    let paid_in = money::round_cents(student.agency_paid);
    Ok(WalletSummary {
        student_id,
        capacity,
        paid_in,
        ledger_paid_in,
        deducted,
        balance: money::round_cents(capacity - deducted),
        funded_balance: money::round_cents(paid_in - deducted),
        deductions,
    })
}

/// Compares one student's wallet counter with the agency payment ledger.
pub async fn reconcile_agency<C>(db: &C, student_id: i64) -> Result<AgencyReconciliation>
where
    C: ConnectionTrait,
{
    let student = require_student(db, student_id).await?;
    let ledger_sum = crate::core::payment::paid_total(db, student_id, FeeType::Agency).await?;
    Ok(AgencyReconciliation {
        student_id,
        class_name: student.class_name,
        student_name: student.student_name,
        counter: money::round_cents(student.agency_paid),
        ledger_sum,
    })
}

/// Lists every student whose wallet counter disagrees with the ledger.
pub async fn find_agency_mismatches<C>(db: &C) -> Result<Vec<AgencyReconciliation>>
where
    C: ConnectionTrait,
{
    let ledger = crate::core::payment::paid_totals_by_student(db).await?;
    let students = Student::find().all(db).await?;

    let mismatches: Vec<AgencyReconciliation> = students
        .into_iter()
        .map(|s| {
            let ledger_sum = ledger
                .get(&s.id)
                .and_then(|totals| totals.get(&FeeType::Agency))
                .copied()
                .unwrap_or(0.0);
            AgencyReconciliation {
                student_id: s.id,
                class_name: s.class_name,
                student_name: s.student_name,
                counter: money::round_cents(s.agency_paid),
                ledger_sum,
            }
        })
        .filter(|r| !r.is_consistent())
        .collect();

    if !mismatches.is_empty() {
        warn!(count = mismatches.len(), "Agency wallet counters out of step with ledger");
    }
    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::payment;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_add_deduction_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let result = add_deduction(
            &db,
            NewDeduction {
                student_id: 1,
                item_type: AgencyItem::Uniform,
                amount: -5.0,
                item_date: test_date(),
                remark: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_deduction_before_funding_uses_capacity() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_test_student(&db, "三年1班", "张三").await?;

        // No agency payment yet: the capacity check still passes
        let receipt = deduct(&db, student.id, 200.0).await?;
        assert_eq!(receipt.capacity, 600.0);
        assert_eq!(receipt.total_deducted, 200.0);
        assert_eq!(receipt.balance, 400.0);

        let wallet = wallet_summary(&db, student.id).await?;
        assert_eq!(wallet.balance, 400.0);
        assert_eq!(wallet.paid_in, 0.0);
        assert_eq!(wallet.funded_balance, -200.0);
        assert_eq!(wallet.deductions.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_deductions_never_exceed_capacity() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_test_student(&db, "三年1班", "张三").await?;

        deduct(&db, student.id, 350.0).await?;
        let result = deduct(&db, student.id, 300.0).await;
        match result {
            Err(Error::ExceedsWalletCapacity {
                capacity,
                already_deducted,
                amount,
                remaining,
            }) => {
                assert_eq!(capacity, 600.0);
                assert_eq!(already_deducted, 350.0);
                assert_eq!(amount, 300.0);
                assert_eq!(remaining, 250.0);
            }
            other => panic!("expected ExceedsWalletCapacity, got {other:?}"),
        }
        let receipt = deduct(&db, student.id, 250.0).await?;
        assert_eq!(receipt.balance, 0.0);
        assert_eq!(total_deducted(&db, student.id).await?, 600.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_deduction_restores_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_test_student(&db, "三年1班", "张三").await?;
        let receipt = deduct(&db, student.id, 600.0).await?;

        remove_deduction(&db, receipt.deduction.id).await?;
        assert_eq!(wallet_summary(&db, student.id).await?.balance, 600.0);

        let result = remove_deduction(&db, receipt.deduction.id).await;
        assert!(matches!(result, Err(Error::DeductionNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_deduction_unknown_student() -> Result<()> {
        let db = setup_test_db().await?;
        let result = deduct(&db, 77, 10.0).await;
        assert!(matches!(result, Err(Error::StudentNotFound { id: 77 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reconciliation_tracks_counter_and_ledger() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_test_student(&db, "三年1班", "张三").await?;
        pay(&db, student.id, FeeType::Agency, 300.0).await?;
        let second = pay(&db, student.id, FeeType::Agency, 100.0).await?;
        payment::delete_payment(&db, second.record.id).await?;

        let rec = reconcile_agency(&db, student.id).await?;
        assert_eq!(rec.counter, 300.0);
        assert_eq!(rec.ledger_sum, 300.0);
        assert!(rec.is_consistent());
        assert!(find_agency_mismatches(&db).await?.is_empty());

        // Knock the counter out of step behind the ledger's back
        set_agency_paid(&db, student.id, 250.0).await?;

        let mismatches = find_agency_mismatches(&db).await?;
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].counter, 250.0);
        assert_eq!(mismatches[0].ledger_sum, 300.0);
        Ok(())
    }
}
