//! Annual class promotion.
//!
//! Advances every class one grade, removes the graduating cohort and clears the
//! payment ledger so the new academic year starts with nothing paid. Owed
//! amounts and agency deductions of the remaining students are kept. The date of
//! the last run is tracked in the `system_state` table.

use crate::{
    core::class_name,
    entities::{
        AgencyFeeDeduction, PaymentRecord, Student, SystemState, agency_fee_deduction,
        payment_record, student, system_state,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

const LAST_PROMOTION_KEY: &str = "last_promotion_date";

/// A class that changed its name.
#[derive(Debug, Clone, Serialize)]
pub struct RenamedClass {
    /// Name before promotion
    pub from: String,
    /// Name after promotion
    pub to: String,
    /// Number of students moved
    pub student_count: usize,
}

/// Result of [`promote_classes`].
#[derive(Debug, Clone, Serialize)]
pub struct PromotionSummary {
    /// Graduating classes that were removed
    pub graduated_classes: Vec<String>,
    /// Number of graduating students removed
    pub graduated_students: usize,
    /// Classes advanced to the next grade
    pub renamed_classes: Vec<RenamedClass>,
    /// Classes without a recognisable grade, left under their old name
    pub unchanged_classes: Vec<String>,
    /// Payment records cleared across all remaining classes
    pub cleared_payments: u64,
    /// Date the promotion ran
    pub promotion_date: NaiveDate,
    /// Date of the run before this one, if any
    pub previous_promotion_date: Option<NaiveDate>,
}

/// Retrieves the date of the last promotion from the `system_state` table.
pub async fn get_last_promotion_date<C>(db: &C) -> Result<Option<NaiveDate>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_PROMOTION_KEY))
        .one(db)
        .await?;

    match state {
        Some(s) => NaiveDate::parse_from_str(&s.value, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| Error::Config {
                message: format!("Failed to parse last promotion date: {e}"),
            }),
        None => Ok(None),
    }
}

async fn set_last_promotion_date<C>(db: &C, date: NaiveDate) -> Result<()>
where
    C: ConnectionTrait,
{
    let date_str = date.format("%Y-%m-%d").to_string();
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_PROMOTION_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(date_str);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(LAST_PROMOTION_KEY.to_string()),
            value: Set(date_str),
            updated_at: Set(now),
            ..Default::default()
        };
        new_state.insert(db).await?;
    }

    Ok(())
}

/// Runs the promotion in a single transaction:
///
/// 1. Deletes deductions, payments and rows of students in graduating classes
/// 2. Renames every other class to its next-grade name
/// 3. Clears all remaining payment records and resets the wallet counters
/// 4. Records the promotion date
///
/// Students are grouped by id before any rename, so a class renamed into a name
/// that another class is about to leave is never promoted twice.
///
/// # Errors
/// [`Error::ConfirmationRequired`] unless `confirmed` is true; nothing is changed.
#[instrument(skip(db))]
pub async fn promote_classes(db: &DatabaseConnection, confirmed: bool) -> Result<PromotionSummary> {
    if !confirmed {
        warn!("Promotion rejected: not confirmed");
        return Err(Error::ConfirmationRequired {
            operation: "promote_classes",
        });
    }

    let txn = db.begin().await?;
    let previous_promotion_date = get_last_promotion_date(&txn).await?;
    let today = Utc::now().date_naive();

    let mut by_class: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for s in Student::find().all(&txn).await? {
        by_class.entry(s.class_name).or_default().push(s.id);
    }

    let mut graduated_classes = Vec::new();
    let mut graduated_ids = Vec::new();
    let mut renames = Vec::new();
    let mut unchanged_classes = Vec::new();

    for (name, ids) in by_class {
        if class_name::is_graduating(&name) {
            graduated_ids.extend(ids);
            graduated_classes.push(name);
        } else if let Some(next) = class_name::next_grade_name(&name) {
            renames.push((name, next, ids));
        } else {
            unchanged_classes.push(name);
        }
    }

    if !graduated_ids.is_empty() {
        AgencyFeeDeduction::delete_many()
            .filter(agency_fee_deduction::Column::StudentId.is_in(graduated_ids.clone()))
            .exec(&txn)
            .await?;
        PaymentRecord::delete_many()
            .filter(payment_record::Column::StudentId.is_in(graduated_ids.clone()))
            .exec(&txn)
            .await?;
        Student::delete_many()
            .filter(student::Column::Id.is_in(graduated_ids.clone()))
            .exec(&txn)
            .await?;
    }

    let now = Utc::now();
    let mut renamed_classes = Vec::with_capacity(renames.len());
    for (from, to, ids) in renames {
        Student::update_many()
            .col_expr(student::Column::ClassName, Expr::value(to.clone()))
            .col_expr(student::Column::UpdatedAt, Expr::value(now))
            .filter(student::Column::Id.is_in(ids.clone()))
            .exec(&txn)
            .await?;
        renamed_classes.push(RenamedClass {
            from,
            to,
            student_count: ids.len(),
        });
    }

    let cleared_payments = PaymentRecord::delete_many().exec(&txn).await?.rows_affected;
    // Agency payments are gone, so the counter restarts with them
    Student::update_many()
        .col_expr(student::Column::AgencyPaid, Expr::value(0.0))
        .exec(&txn)
        .await?;

    set_last_promotion_date(&txn, today).await?;
    txn.commit().await?;

    renamed_classes.sort_by_cached_key(|r| class_name::class_sort_key(&r.to));
    class_name::sort_class_names(&mut graduated_classes);
    class_name::sort_class_names(&mut unchanged_classes);

    info!(
        graduated = graduated_ids.len(),
        renamed = renamed_classes.len(),
        cleared_payments,
        "Classes promoted"
    );
    Ok(PromotionSummary {
        graduated_classes,
        graduated_students: graduated_ids.len(),
        renamed_classes,
        unchanged_classes,
        cleared_payments,
        promotion_date: today,
        previous_promotion_date,
    })
}

/// Formats a promotion summary for logs or a confirmation message.
#[must_use]
pub fn format_promotion_summary(summary: &PromotionSummary) -> String {
    use std::fmt::Write;

    let mut out = format!(
        "Promotion {} - {} graduated student(s), {} class(es) advanced, {} payment(s) cleared\n",
        summary.promotion_date,
        summary.graduated_students,
        summary.renamed_classes.len(),
        summary.cleared_payments
    );
    for class in &summary.graduated_classes {
        let _ = writeln!(out, "  {class} graduated");
    }
    for renamed in &summary.renamed_classes {
        let _ = writeln!(
            out,
            "  {} -> {} ({} students)",
            renamed.from, renamed.to, renamed.student_count
        );
    }
    for class in &summary.unchanged_classes {
        let _ = writeln!(out, "  {class} unchanged");
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{agency, payment, student as students};
    use crate::entities::FeeType;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_promotion_requires_confirmation() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_student_with_tuition(&db, "五年2班", "张三", 1000.0).await?;
        pay(&db, student.id, FeeType::Tuition, 500.0).await?;

        let result = promote_classes(&db, false).await;
        assert!(matches!(
            result,
            Err(Error::ConfirmationRequired {
                operation: "promote_classes"
            })
        ));

        let unchanged = students::require_student(&db, student.id).await?;
        assert_eq!(unchanged.class_name, "五年2班");
        assert_eq!(payment::list_payments(&db, student.id).await?.len(), 1);
        assert_eq!(get_last_promotion_date(&db).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_promotion_graduates_and_clears_ledger() -> Result<()> {
        let db = setup_test_db().await?;
        let graduate = create_student_with_tuition(&db, "六年1班", "毕业生", 1000.0).await?;
        pay(&db, graduate.id, FeeType::Tuition, 1000.0).await?;
        deduct(&db, graduate.id, 100.0).await?;

        let fifth = create_student_with_tuition(&db, "五年2班", "张三", 1000.0).await?;
        pay(&db, fifth.id, FeeType::Tuition, 400.0).await?;
        pay(&db, fifth.id, FeeType::Agency, 300.0).await?;
        deduct(&db, fifth.id, 150.0).await?;

        let summary = promote_classes(&db, true).await?;
        assert_eq!(summary.graduated_classes, vec!["六年1班".to_string()]);
        assert_eq!(summary.graduated_students, 1);
        assert_eq!(summary.cleared_payments, 2);

        // Graduates and all their rows are gone
        assert!(students::get_student(&db, graduate.id).await?.is_none());
        assert!(
            agency::list_deductions(&db, graduate.id).await?.is_empty(),
            "graduate deductions should be deleted"
        );

        // Remaining students keep owed amounts and deductions, lose payments
        let promoted = students::require_student(&db, fifth.id).await?;
        assert_eq!(promoted.class_name, "六年2班");
        assert_eq!(promoted.tuition_fee, 1000.0);
        assert_eq!(promoted.agency_paid, 0.0);
        assert!(payment::list_payments(&db, fifth.id).await?.is_empty());
        assert_eq!(agency::total_deducted(&db, fifth.id).await?, 150.0);
        assert!(agency::find_agency_mismatches(&db).await?.is_empty());

        assert_eq!(summary.promotion_date, Utc::now().date_naive());
        assert_eq!(
            get_last_promotion_date(&db).await?,
            Some(summary.promotion_date)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_promotion_does_not_chain_renames() -> Result<()> {
        let db = setup_test_db().await?;
        let third = create_test_student(&db, "三年1班", "甲").await?;
        let fourth = create_test_student(&db, "四年1班", "乙").await?;
        let fifth = create_test_student(&db, "五年2班", "丙").await?;

        let summary = promote_classes(&db, true).await?;
        assert_eq!(summary.renamed_classes.len(), 3);
        assert_eq!(
            students::require_student(&db, third.id).await?.class_name,
            "四年1班"
        );
        assert_eq!(
            students::require_student(&db, fourth.id).await?.class_name,
            "五年1班"
        );
        assert_eq!(
            students::require_student(&db, fifth.id).await?.class_name,
            "六年2班"
        );

        // A second run graduates the class promoted into the sixth grade
        let second = promote_classes(&db, true).await?;
        assert_eq!(second.graduated_classes, vec!["六年2班".to_string()]);
        assert_eq!(second.previous_promotion_date, Some(summary.promotion_date));
        assert!(students::get_student(&db, fifth.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_unrecognised_class_names_are_kept() -> Result<()> {
        let db = setup_test_db().await?;
        let other = create_student_with_tuition(&db, "兴趣班", "丁", 200.0).await?;
        pay(&db, other.id, FeeType::Tuition, 200.0).await?;

        let summary = promote_classes(&db, true).await?;
        assert_eq!(summary.unchanged_classes, vec!["兴趣班".to_string()]);
        assert_eq!(
            students::require_student(&db, other.id).await?.class_name,
            "兴趣班"
        );
        assert!(payment::list_payments(&db, other.id).await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_format_promotion_summary() {
        let summary = PromotionSummary {
            graduated_classes: vec!["六年1班".to_string()],
            graduated_students: 30,
            renamed_classes: vec![RenamedClass {
                from: "五年2班".to_string(),
                to: "六年2班".to_string(),
                student_count: 28,
            }],
            unchanged_classes: vec![],
            cleared_payments: 120,
            promotion_date: NaiveDate::from_ymd_opt(2024, 8, 31).unwrap(),
            previous_promotion_date: None,
        };
        let text = format_promotion_summary(&summary);
        assert!(text.contains("30 graduated"));
        assert!(text.contains("五年2班 -> 六年2班 (28 students)"));
        assert!(text.contains("六年1班 graduated"));
    }
}
