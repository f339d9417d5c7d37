//! Bulk import and export of students.
//!
//! The spreadsheet layer turns documents into [`ImportRow`]s and renders
//! [`ExportRow`]s; this module only owns the ledger side. Rows are matched on
//! `(class_name, student_name)`. Paid-to-date figures never bypass the payment
//! ledger: a figure above the ledger sum is recorded as a payment for the
//! difference, so an import cannot push a student past an obligation.

use crate::{
    core::{
        money, payment,
        payment::NewPayment,
        statistics,
        student::{self, NewStudent, Obligations, StudentProfile},
    },
    entities::{FeeType, student as student_entity},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Remark attached to payments created by an import.
pub const IMPORT_REMARK: &str = "import";

/// One student as read from an import document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRow {
    /// Class name
    pub class_name: String,
    /// Student name
    pub student_name: String,
    /// Gender
    #[serde(default)]
    pub gender: Option<String>,
    /// Owed tuition
    #[serde(default)]
    pub tuition_fee: f64,
    /// Owed lunch fee
    #[serde(default)]
    pub lunch_fee: f64,
    /// Owed nap fee
    #[serde(default)]
    pub nap_fee: f64,
    /// Owed after-school fee
    #[serde(default)]
    pub after_school_fee: f64,
    /// Owed club fee
    #[serde(default)]
    pub club_fee: f64,
    /// Wallet capacity; keeps the current value (or the default for new students) when absent
    #[serde(default)]
    pub agency_fee: Option<f64>,
    /// Paid-to-date figures per fee type
    #[serde(default)]
    pub paid: BTreeMap<FeeType, f64>,
    /// Remark
    #[serde(default)]
    pub remark: Option<String>,
}

/// A row that could not be fully imported.
#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    /// Position in the request
    pub index: usize,
    /// Class name as given
    pub class_name: String,
    /// Student name as given
    pub student_name: String,
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
}

/// Result of [`upsert_students`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// Students created
    pub created: usize,
    /// Existing students overwritten
    pub updated: usize,
    /// Payments recorded for paid-to-date differences
    pub payments_recorded: usize,
    /// Paid figures below the ledger sum, left alone
    pub paid_figures_skipped: usize,
    /// Rows that failed
    pub failures: Vec<ImportFailure>,
}

/// One fee type in an export row.
#[derive(Debug, Clone, Serialize)]
pub struct ExportFee {
    /// Fee type
    pub fee_type: FeeType,
    /// Column label
    pub label: &'static str,
    /// Owed amount
    pub owed: f64,
    /// Paid amount
    pub paid: f64,
}

/// One student as written to an export document.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    /// Class name
    pub class_name: String,
    /// Student name
    pub student_name: String,
    /// Gender
    pub gender: Option<String>,
    /// Owed/paid pairs in column order
    pub fees: Vec<ExportFee>,
    /// Remark
    pub remark: Option<String>,
}

#[derive(Default)]
struct RowOutcome {
    created: bool,
    payments_recorded: usize,
    paid_figures_skipped: usize,
}

async fn import_row(
    db: &DatabaseTransaction,
    row: ImportRow,
    import_date: NaiveDate,
    default_agency_fee: f64,
) -> Result<RowOutcome> {
    let mut outcome = RowOutcome::default();

    let existing = student::find_student_by_name(db, &row.class_name, &row.student_name).await?;
    let target: student_entity::Model = match existing {
        Some(current) => {
            let obligations = Obligations {
                tuition_fee: row.tuition_fee,
                lunch_fee: row.lunch_fee,
                nap_fee: row.nap_fee,
                after_school_fee: row.after_school_fee,
                club_fee: row.club_fee,
                agency_fee: row.agency_fee.unwrap_or(current.agency_fee),
            };
            student::set_obligations(db, current.id, obligations).await?;
            student::update_student_profile(
                db,
                current.id,
                StudentProfile {
                    class_name: current.class_name.clone(),
                    student_name: current.student_name.clone(),
                    gender: row.gender.clone(),
                    remark: row.remark.clone(),
                },
            )
            .await?
        }
        None => {
            outcome.created = true;
            student::create_student(
                db,
                NewStudent {
                    class_name: row.class_name.clone(),
                    student_name: row.student_name.clone(),
                    gender: row.gender.clone(),
                    tuition_fee: row.tuition_fee,
                    lunch_fee: row.lunch_fee,
                    nap_fee: row.nap_fee,
                    after_school_fee: row.after_school_fee,
                    club_fee: row.club_fee,
                    agency_fee: row.agency_fee,
                    remark: row.remark.clone(),
                },
                default_agency_fee,
            )
            .await?
        }
    };

    for (fee_type, figure) in row.paid {
        let figure = money::validate_owed_amount(figure)?;
        let ledger = payment::paid_total(db, target.id, fee_type).await?;
        let difference = money::round_cents(figure - ledger);

        if difference > 0.0 {
            payment::record_payment(
                db,
                NewPayment {
                    student_id: target.id,
                    fee_type,
                    amount: difference,
                    payment_date: import_date,
                    remark: Some(IMPORT_REMARK.to_string()),
                },
            )
            .await?;
            outcome.payments_recorded += 1;
        } else if difference < 0.0 {
            warn!(
                student_id = target.id,
                %fee_type,
                figure,
                ledger,
                "Imported paid figure below ledger sum, skipped"
            );
            outcome.paid_figures_skipped += 1;
        }
    }

    Ok(outcome)
}

/// Creates or overwrites students from import rows.
///
/// Each row is applied in its own transaction: a failing row is rolled back
/// whole, reported in [`ImportSummary::failures`], and the remaining rows
/// continue. Storage failures abort the whole import.
#[instrument(skip(db, rows), fields(rows = rows.len()))]
pub async fn upsert_students(
    db: &DatabaseConnection,
    rows: Vec<ImportRow>,
    import_date: NaiveDate,
    default_agency_fee: f64,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (index, row) in rows.into_iter().enumerate() {
        let class_name = row.class_name.clone();
        let student_name = row.student_name.clone();

        let txn = db.begin().await?;
        let result = import_row(&txn, row, import_date, default_agency_fee).await;
        if result.is_ok() {
            txn.commit().await?;
        } else {
            txn.rollback().await?;
        }

        match result {
            Ok(outcome) => {
                if outcome.created {
                    summary.created += 1;
                } else {
                    summary.updated += 1;
                }
                summary.payments_recorded += outcome.payments_recorded;
                summary.paid_figures_skipped += outcome.paid_figures_skipped;
            }
            Err(e @ (Error::Database(_) | Error::Io(_))) => return Err(e),
            Err(e) => {
                warn!(index, error = %e, "Import row rejected");
                summary.failures.push(ImportFailure {
                    index,
                    class_name,
                    student_name,
                    code: e.code(),
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        payments = summary.payments_recorded,
        failed = summary.failures.len(),
        "Import finished"
    );
    Ok(summary)
}

/// One export row per student, ordered by class then name.
pub async fn export_rows(db: &DatabaseConnection) -> Result<Vec<ExportRow>> {
    let summaries = statistics::all_student_summaries(db).await?;
    Ok(summaries
        .into_iter()
        .map(|s| ExportRow {
            fees: s
                .lines
                .iter()
                .map(|l| ExportFee {
                    fee_type: l.fee_type,
                    label: l.label,
                    owed: l.owed,
                    paid: l.paid,
                })
                .collect(),
            class_name: s.student.class_name,
            student_name: s.student.student_name,
            gender: s.student.gender,
            remark: s.student.remark,
        })
        .collect())
}
