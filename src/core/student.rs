//! Obligation store - students and what each of them owes.
//!
//! Provides functions for creating, retrieving, updating, and deleting students.
//! Owed amounts change only through explicit admin edits. Lowering an owed
//! amount below what has already been paid is allowed; the statistics layer
//! reports such fee types as over-collected rather than hiding the negative
//! remainder.

use crate::{
    core::{class_name, money},
    entities::{AgencyFeeDeduction, PaymentRecord, Student, agency_fee_deduction, payment_record, student},
    errors::{Error, Result},
};
use sea_orm::{QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// The six owed amounts of a student.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Obligations {
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
    /// Agency-fee wallet capacity
    #[serde(default)]
    pub agency_fee: f64,
}

impl Obligations {
    /// Checks every amount is a finite, non-negative number and rounds to cents.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            tuition_fee: money::validate_owed_amount(self.tuition_fee)?,
            lunch_fee: money::validate_owed_amount(self.lunch_fee)?,
            nap_fee: money::validate_owed_amount(self.nap_fee)?,
            after_school_fee: money::validate_owed_amount(self.after_school_fee)?,
            club_fee: money::validate_owed_amount(self.club_fee)?,
            agency_fee: money::validate_owed_amount(self.agency_fee)?,
        })
    }

    fn apply(self, model: &mut student::ActiveModel) {
        model.tuition_fee = Set(self.tuition_fee);
        model.lunch_fee = Set(self.lunch_fee);
        model.nap_fee = Set(self.nap_fee);
        model.after_school_fee = Set(self.after_school_fee);
        model.club_fee = Set(self.club_fee);
        model.agency_fee = Set(self.agency_fee);
    }
}

/// Input for [`create_student`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStudent {
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
    /// Wallet capacity; the configured default allowance when absent
    #[serde(default)]
    pub agency_fee: Option<f64>,
    /// Remark
    #[serde(default)]
    pub remark: Option<String>,
}

/// Editable identity fields of a student.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentProfile {
    /// Class name
    pub class_name: String,
    /// Student name
    pub student_name: String,
    /// Gender
    #[serde(default)]
    pub gender: Option<String>,
    /// Remark
    #[serde(default)]
    pub remark: Option<String>,
}

fn clean_name(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Finds a student by id.
pub async fn get_student<C>(db: &C, student_id: i64) -> Result<Option<student::Model>>
where
    C: ConnectionTrait,
{
    Student::find_by_id(student_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a student by id, turning absence into [`Error::StudentNotFound`].
pub async fn require_student<C>(db: &C, student_id: i64) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    get_student(db, student_id)
        .await?
        .ok_or(Error::StudentNotFound { id: student_id })
}

/// Finds a student by the `(class_name, student_name)` key used for imports.
pub async fn find_student_by_name<C>(
    db: &C,
    class_name: &str,
    student_name: &str,
) -> Result<Option<student::Model>>
where
    C: ConnectionTrait,
{
    Student::find()
        .filter(student::Column::ClassName.eq(class_name.trim()))
        .filter(student::Column::StudentName.eq(student_name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists students, optionally restricted to one class, ordered by class then name.
pub async fn list_students<C>(db: &C, class_filter: Option<&str>) -> Result<Vec<student::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Student::find();
    if let Some(class) = class_filter {
        query = query.filter(student::Column::ClassName.eq(class.trim()));
    }
    let mut students = query.all(db).await?;
    students.sort_by_cached_key(|s| {
        (
            class_name::class_sort_key(&s.class_name),
            s.student_name.clone(),
            s.id,
        )
    });
    Ok(students)
}

/// Lists the distinct class names currently holding at least one student, in display order.
///
/// Classes are not stored on their own, so a class disappears with its last student.
pub async fn list_classes<C>(db: &C) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    let mut names: Vec<String> = Student::find()
        .select_only()
        .column(student::Column::ClassName)
        .distinct()
        .into_tuple::<String>()
        .all(db)
        .await?;
    class_name::sort_class_names(&mut names);
    Ok(names)
}

/// Creates a student with the given owed amounts.
///
/// The agency fee falls back to `default_agency_fee`, the institution's standard
/// prepaid allowance. The wallet counter starts at zero.
#[instrument(skip(db, new_student), fields(class = %new_student.class_name, name = %new_student.student_name))]
pub async fn create_student<C>(
    db: &C,
    new_student: NewStudent,
    default_agency_fee: f64,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let class_name = clean_name(&new_student.class_name, "Class name")?;
    let student_name = clean_name(&new_student.student_name, "Student name")?;
    let obligations = Obligations {
        tuition_fee: new_student.tuition_fee,
        lunch_fee: new_student.lunch_fee,
        nap_fee: new_student.nap_fee,
        after_school_fee: new_student.after_school_fee,
        club_fee: new_student.club_fee,
        agency_fee: new_student.agency_fee.unwrap_or(default_agency_fee),
    }
    .validated()?;

    if find_student_by_name(db, &class_name, &student_name)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateStudent {
            class_name,
            student_name,
        });
    }

    let now = chrono::Utc::now();
    let mut model = student::ActiveModel {
        class_name: Set(class_name),
        student_name: Set(student_name),
        gender: Set(clean_optional(new_student.gender)),
        agency_paid: Set(0.0),
        remark: Set(clean_optional(new_student.remark)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    obligations.apply(&mut model);

    let created = model.insert(db).await?;
    info!(student_id = created.id, "Student created");
    Ok(created)
}

/// Overwrites the six owed amounts of a student.
///
/// No check against paid-to-date amounts is made here: an admin may lower an
/// obligation below what was already collected.
#[instrument(skip(db))]
pub async fn set_obligations<C>(
    db: &C,
    student_id: i64,
    obligations: Obligations,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let obligations = obligations.validated()?;
    let existing = require_student(db, student_id).await?;

    let mut model: student::ActiveModel = existing.into();
    obligations.apply(&mut model);
    model.updated_at = Set(chrono::Utc::now());
    let updated = model.update(db).await?;
    info!(student_id, "Obligations updated");
    Ok(updated)
}

/// Updates class, name, gender and remark of a student.
#[instrument(skip(db, profile))]
pub async fn update_student_profile<C>(
    db: &C,
    student_id: i64,
    profile: StudentProfile,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let class_name = clean_name(&profile.class_name, "Class name")?;
    let student_name = clean_name(&profile.student_name, "Student name")?;
    let existing = require_student(db, student_id).await?;

    if let Some(other) = find_student_by_name(db, &class_name, &student_name).await? {
        if other.id != student_id {
            return Err(Error::DuplicateStudent {
                class_name,
                student_name,
            });
        }
    }

    let mut model: student::ActiveModel = existing.into();
    model.class_name = Set(class_name);
    model.student_name = Set(student_name);
    model.gender = Set(clean_optional(profile.gender));
    model.remark = Set(clean_optional(profile.remark));
    model.updated_at = Set(chrono::Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Deletes a student together with their payments and deductions.
#[instrument(skip(db))]
pub async fn delete_student(db: &DatabaseConnection, student_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    require_student(&txn, student_id).await?;

    PaymentRecord::delete_many()
        .filter(payment_record::Column::StudentId.eq(student_id))
        .exec(&txn)
        .await?;
    AgencyFeeDeduction::delete_many()
        .filter(agency_fee_deduction::Column::StudentId.eq(student_id))
        .exec(&txn)
        .await?;
    Student::delete_by_id(student_id).exec(&txn).await?;

    txn.commit().await?;
    info!(student_id, "Student deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::FeeType;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_student_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_student(
            &db,
            NewStudent {
                class_name: "三年1班".to_string(),
                student_name: "  ".to_string(),
                ..Default::default()
            },
            600.0,
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_student(
            &db,
            NewStudent {
                class_name: "三年1班".to_string(),
                student_name: "张三".to_string(),
                tuition_fee: -1.0,
                ..Default::default()
            },
            600.0,
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount }) if amount == -1.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_student_defaults_agency_fee() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_student(
            &db,
            NewStudent {
                class_name: " 三年1班 ".to_string(),
                student_name: "张三".to_string(),
                tuition_fee: 5000.0,
                ..Default::default()
            },
            600.0,
        )
        .await?;

        assert_eq!(created.class_name, "三年1班");
        assert_eq!(created.tuition_fee, 5000.0);
        assert_eq!(created.agency_fee, 600.0);
        assert_eq!(created.agency_paid, 0.0);
        assert_eq!(created.owed(FeeType::Agency), 600.0);
        assert_eq!(created.total_owed(), 5600.0);

        let overridden = create_student(
            &db,
            NewStudent {
                class_name: "三年1班".to_string(),
                student_name: "李四".to_string(),
                agency_fee: Some(0.0),
                ..Default::default()
            },
            600.0,
        )
        .await?;
        assert_eq!(overridden.agency_fee, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_student_rejects_duplicate() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_student(&db, "三年1班", "张三").await?;
        let result = create_test_student(&db, "三年1班", "张三").await;
        assert!(matches!(result, Err(Error::DuplicateStudent { .. })));

        // Same name in another class is a different student
        create_test_student(&db, "三年2班", "张三").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_set_obligations_overwrites_without_paid_check() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_student_with_tuition(&db, "三年1班", "张三", 5000.0).await?;
        pay(&db, student.id, FeeType::Tuition, 3000.0).await?;

        let updated = set_obligations(
            &db,
            student.id,
            Obligations {
                tuition_fee: 1000.0,
                agency_fee: 600.0,
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.tuition_fee, 1000.0);
        assert_eq!(updated.lunch_fee, 0.0);
        assert!(updated.updated_at >= student.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_obligations_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = set_obligations(&db, 42, Obligations::default()).await;
        assert!(matches!(result, Err(Error::StudentNotFound { id: 42 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_profile_checks_duplicates() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_student(&db, "三年1班", "张三").await?;
        create_test_student(&db, "三年1班", "李四").await?;

        let result = update_student_profile(
            &db,
            a.id,
            StudentProfile {
                class_name: "三年1班".to_string(),
                student_name: "李四".to_string(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::DuplicateStudent { .. })));

        let moved = update_student_profile(
            &db,
            a.id,
            StudentProfile {
                class_name: "三年2班".to_string(),
                student_name: "张三".to_string(),
                gender: Some("男".to_string()),
                remark: Some(String::new()),
            },
        )
        .await?;
        assert_eq!(moved.class_name, "三年2班");
        assert_eq!(moved.gender.as_deref(), Some("男"));
        assert_eq!(moved.remark, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_students_and_classes_in_display_order() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_student(&db, "三年2班", "乙").await?;
        create_test_student(&db, "一年1班", "甲").await?;
        create_test_student(&db, "兴趣班", "丙").await?;
        create_test_student(&db, "三年2班", "丁").await?;

        let classes = list_classes(&db).await?;
        assert_eq!(classes, vec!["一年1班", "三年2班", "兴趣班"]);

        let students = list_students(&db, None).await?;
        let classes_in_order: Vec<&str> = students.iter().map(|s| s.class_name.as_str()).collect();
        assert_eq!(classes_in_order, vec!["一年1班", "三年2班", "三年2班", "兴趣班"]);

        let filtered = list_students(&db, Some("三年2班")).await?;
        assert_eq!(filtered.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_last_student_removes_class() -> Result<()> {
        let db = setup_test_db().await?;
        let student = create_student_with_tuition(&db, "三年1班", "张三", 1000.0).await?;
        create_test_student(&db, "四年1班", "李四").await?;
        pay(&db, student.id, FeeType::Tuition, 100.0).await?;
        deduct(&db, student.id, 50.0).await?;

        delete_student(&db, student.id).await?;

        assert!(get_student(&db, student.id).await?.is_none());
        assert_eq!(list_classes(&db).await?, vec!["四年1班"]);
        assert_eq!(PaymentRecord::find().count(&db).await?, 0);
        assert_eq!(AgencyFeeDeduction::find().count(&db).await?, 0);

        let result = delete_student(&db, student.id).await;
        assert!(matches!(result, Err(Error::StudentNotFound { .. })));
        Ok(())
    }
}
