//! Payment record entity - the append-only payment ledger ("已交").
//!
//! Rows are inserted or deleted, never updated. Paid totals per
//! (`student_id`, `fee_type`) are always computed by summing these rows.
use super::FeeType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_records")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student who paid
    pub student_id: i64,
    /// Fee category the payment applies to
    pub fee_type: FeeType,
    /// Amount paid, always positive
    pub amount: f64,
    /// Date the money was received
    pub payment_date: Date,
    /// Optional note
    pub remark: Option<String>,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `PaymentRecord` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
