//! Agency fee deduction entity - itemised spend-downs of the agency-fee wallet.
//!
//! Like payments, deductions are append-only: inserted or deleted, never edited.

use super::AgencyItem;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Agency fee deduction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agency_fee_deductions")]
pub struct Model {
    /// Unique identifier for the deduction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student whose wallet is charged
    pub student_id: i64,
    /// What the money was spent on
    pub item_type: AgencyItem,
    /// Amount deducted, always positive
    pub amount: f64,
    /// Date of the purchase
    pub item_date: Date,
    /// Optional note
    pub remark: Option<String>,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `AgencyFeeDeduction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each deduction belongs to one student
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
