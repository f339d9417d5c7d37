//! Aggregated statistics - read-only totals derived from the ledgers.
//!
//! Nothing here is stored. Every figure is recomputed from `students`, the
//! payment ledger and the wallet counter on each call.
//!
//! "Paid" for display follows one fixed rule: the five ordinary fee types use
//! the payment-ledger sum, while the agency fee uses the `agency_paid` wallet
//! counter. Payment recording keeps the two in lockstep; see
//! [`crate::core::agency::find_agency_mismatches`] for the reconciliation check.

use crate::{
    core::{class_name, money, payment, payment::PaidTotals, student::require_student},
    entities::{FeeType, Student, student},
    errors::Result,
};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Collection rate as a percentage. A zero fee yields 0 rather than dividing by zero.
#[must_use]
pub fn collection_rate_percent(total_paid: f64, total_fee: f64) -> f64 {
    if total_fee == 0.0 {
        return 0.0;
    }

    (total_paid / total_fee) * 100.0
}

/// Collection rate formatted for display, e.g. `"62.50%"`; `"0%"` when nothing is owed.
#[must_use]
pub fn format_collection_rate(total_paid: f64, total_fee: f64) -> String {
    if total_fee == 0.0 {
        return "0%".to_string();
    }
    format!("{:.2}%", collection_rate_percent(total_paid, total_fee))
}

/// Paid figures as displayed: ledger sums for the five ordinary fee types, the
/// wallet counter for the agency fee.
#[must_use]
pub fn display_paid(student: &student::Model, ledger: Option<&PaidTotals>) -> PaidTotals {
    FeeType::ALL
        .iter()
        .map(|ft| {
            let paid = match ft {
                FeeType::Agency => money::round_cents(student.agency_paid),
                other => ledger
                    .and_then(|totals| totals.get(other))
                    .copied()
                    .unwrap_or(0.0),
            };
            (*ft, paid)
        })
        .collect()
}

/// One fee type of one student.
#[derive(Debug, Clone, Serialize)]
pub struct FeeLine {
    /// Fee type
    pub fee_type: FeeType,
    /// Display label
    pub label: &'static str,
    /// Owed amount
    pub owed: f64,
    /// Paid amount
    pub paid: f64,
    /// `owed - paid`, negative when over-collected
    pub remaining: f64,
}

/// Everything about one student's fees.
#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    /// The student row
    pub student: student::Model,
    /// Per-fee-type figures in display order
    pub lines: Vec<FeeLine>,
    /// Sum of owed amounts
    pub total_fee: f64,
    /// Sum of paid amounts
    pub total_paid: f64,
    /// `total_fee - total_paid`
    pub remaining: f64,
    /// Collection rate
    pub collection_rate: String,
    /// Fee types whose paid amount is above the owed amount, which happens
    /// when an obligation was lowered after payment
    pub over_collected: Vec<FeeType>,
}

/// Totals of one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassStatistics {
    /// Class name
    pub class_name: String,
    /// Number of students
    pub student_count: usize,
    /// Sum of owed amounts
    pub total_fee: f64,
    /// Sum of paid amounts
    pub total_paid: f64,
    /// `total_fee - total_paid`
    pub remaining: f64,
    /// Collection rate
    pub collection_rate: String,
}

/// School-wide totals of one fee type.
#[derive(Debug, Clone, Serialize)]
pub struct FeeTypeStatistics {
    /// Fee type
    pub fee_type: FeeType,
    /// Display label
    pub label: &'static str,
    /// Sum of owed amounts
    pub total_fee: f64,
    /// Sum of paid amounts
    pub total_paid: f64,
    /// Collection rate
    pub collection_rate: String,
}

/// School-wide statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SchoolStatistics {
    /// Number of students
    pub student_count: usize,
    /// Number of classes
    pub class_count: usize,
    /// Sum of owed amounts
    pub total_fee: f64,
    /// Sum of paid amounts
    pub total_paid: f64,
    /// `total_fee - total_paid`
    pub remaining: f64,
    /// Collection rate
    pub collection_rate: String,
    /// Per-class totals in display order
    pub classes: Vec<ClassStatistics>,
    /// Per-fee-type totals
    pub fee_types: Vec<FeeTypeStatistics>,
}

#[derive(Default)]
struct Accumulator {
    student_count: usize,
    total_fee: f64,
    total_paid: f64,
}

impl Accumulator {
    fn add(&mut self, fee: f64, paid: f64) {
        self.total_fee += fee;
        self.total_paid += paid;
    }

    fn fee(&self) -> f64 {
        money::round_cents(self.total_fee)
    }

    fn paid(&self) -> f64 {
        money::round_cents(self.total_paid)
    }
}

fn summarize(student: student::Model, ledger: Option<&PaidTotals>) -> StudentSummary {
    let paid_by_type = display_paid(&student, ledger);
    let lines: Vec<FeeLine> = FeeType::ALL
        .iter()
        .map(|ft| {
            let owed = money::round_cents(student.owed(*ft));
            let paid = paid_by_type.get(ft).copied().unwrap_or(0.0);
            FeeLine {
                fee_type: *ft,
                label: ft.label(),
                owed,
                paid,
                remaining: money::round_cents(owed - paid),
            }
        })
        .collect();

    let total_fee = money::round_cents(lines.iter().map(|l| l.owed).sum());
    let total_paid = money::round_cents(lines.iter().map(|l| l.paid).sum());
    let over_collected = lines
        .iter()
        .filter(|l| money::exceeds(l.paid, l.owed))
        .map(|l| l.fee_type)
        .collect();

    StudentSummary {
        student,
        lines,
        total_fee,
        total_paid,
        remaining: money::round_cents(total_fee - total_paid),
        collection_rate: format_collection_rate(total_paid, total_fee),
        over_collected,
    }
}

/// Builds the fee summary of one student.
pub async fn student_summary<C>(db: &C, student_id: i64) -> Result<StudentSummary>
where
    C: ConnectionTrait,
{
    let student = require_student(db, student_id).await?;
    let ledger = payment::paid_totals(db, student_id).await?;
    Ok(summarize(student, Some(&ledger)))
}

/// Builds summaries for every student, ordered by class then name.
pub async fn all_student_summaries<C>(db: &C) -> Result<Vec<StudentSummary>>
where
    C: ConnectionTrait,
{
    let students = crate::core::student::list_students(db, None).await?;
    let ledger = payment::paid_totals_by_student(db).await?;
    Ok(students
        .into_iter()
        .map(|s| {
            let totals = ledger.get(&s.id);
            summarize(s, totals)
        })
        .collect())
}

/// Computes school, class and fee-type rollups.
pub async fn get_statistics<C>(db: &C) -> Result<SchoolStatistics>
where
    C: ConnectionTrait,
{
    let students = Student::find().all(db).await?;
    let ledger = payment::paid_totals_by_student(db).await?;

    let mut school = Accumulator::default();
    let mut classes: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut fee_types: BTreeMap<FeeType, Accumulator> = BTreeMap::new();

    for student in &students {
        let paid = display_paid(student, ledger.get(&student.id));
        let student_fee = student.total_owed();
        let student_paid: f64 = paid.values().sum();

        school.student_count += 1;
        school.add(student_fee, student_paid);

        let class = classes.entry(student.class_name.clone()).or_default();
        class.student_count += 1;
        class.add(student_fee, student_paid);

        for ft in FeeType::ALL {
            fee_types
                .entry(ft)
                .or_default()
                .add(student.owed(ft), paid.get(&ft).copied().unwrap_or(0.0));
        }
    }

    let mut class_stats: Vec<ClassStatistics> = classes
        .into_iter()
        .map(|(class_name, acc)| ClassStatistics {
            student_count: acc.student_count,
            total_fee: acc.fee(),
            total_paid: acc.paid(),
            remaining: money::round_cents(acc.fee() - acc.paid()),
            collection_rate: format_collection_rate(acc.paid(), acc.fee()),
            class_name,
        })
        .collect();
    class_stats.sort_by_cached_key(|c| class_name::class_sort_key(&c.class_name));

    let fee_type_stats = FeeType::ALL
        .iter()
        .map(|ft| {
            let acc = fee_types.remove(ft).unwrap_or_default();
            FeeTypeStatistics {
                fee_type: *ft,
                label: ft.label(),
                total_fee: acc.fee(),
                total_paid: acc.paid(),
                collection_rate: format_collection_rate(acc.paid(), acc.fee()),
            }
        })
        .collect();

    debug!(students = school.student_count, "Statistics computed");
    Ok(SchoolStatistics {
        student_count: school.student_count,
        class_count: class_stats.len(),
        total_fee: school.fee(),
        total_paid: school.paid(),
        remaining: money::round_cents(school.fee() - school.paid()),
        collection_rate: format_collection_rate(school.paid(), school.fee()),
        classes: class_stats,
        fee_types: fee_type_stats,
    })
}
