//! Expense record entity - the school's own spending, independent of students.

use super::ExpenseCategory;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expense_records")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Daily operating or personnel
    pub category: ExpenseCategory,
    /// Item within the category's allowed list
    pub item: String,
    /// Date the expense was reported
    pub report_date: Date,
    /// Date the expense occurred
    pub occur_date: Date,
    /// Invoice number, if any
    pub invoice_no: Option<String>,
    /// Amount spent, always positive
    pub amount: f64,
    /// Short summary
    pub summary: Option<String>,
    /// Free-text remark
    pub remark: Option<String>,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// `ExpenseRecord` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
