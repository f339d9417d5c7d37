//! Expense ledger - the school's own spending.
//!
//! Independent of students: no obligation or wallet is involved. Each record
//! files an item under one of two categories, and the item must belong to that
//! category's fixed list.

use crate::{
    core::money,
    entities::{ExpenseCategory, ExpenseRecord, expense_record},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Input for [`create_expense`].
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// Category
    pub category: ExpenseCategory,
    /// Item, checked against the category
    pub item: String,
    /// Date reported
    pub report_date: NaiveDate,
    /// Date incurred
    pub occur_date: NaiveDate,
    /// Invoice number
    pub invoice_no: Option<String>,
    /// Amount, must be positive
    pub amount: f64,
    /// Short summary
    pub summary: Option<String>,
    /// Remark
    pub remark: Option<String>,
}

/// Filter for [`list_expenses`]. Date bounds are inclusive and apply to the occur date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    /// Only this category
    #[serde(default)]
    pub category: Option<ExpenseCategory>,
    /// Earliest occur date
    #[serde(default)]
    pub from: Option<NaiveDate>,
    /// Latest occur date
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// Totals of one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    /// Category
    pub category: ExpenseCategory,
    /// Display label
    pub label: &'static str,
    /// Sum of amounts
    pub total: f64,
    /// Number of records
    pub count: usize,
    /// Per-item sums, items without records omitted
    pub items: BTreeMap<String, f64>,
}

/// Result of [`expense_summary`].
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseSummary {
    /// Sum over all records
    pub total: f64,
    /// Number of records
    pub count: usize,
    /// Per-category totals in fixed order
    pub categories: Vec<CategoryTotal>,
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Records an expense.
///
/// # Errors
/// - [`Error::InvalidAmount`] when the amount is not positive
/// - [`Error::UnknownExpenseItem`] when the item is not in the category's list
#[instrument(skip(db, expense), fields(category = %expense.category, amount = expense.amount))]
pub async fn create_expense<C>(db: &C, expense: NewExpense) -> Result<expense_record::Model>
where
    C: ConnectionTrait,
{
    let amount = money::validate_positive_amount(expense.amount)?;
    let item = expense.category.validate_item(&expense.item)?;

    let model = expense_record::ActiveModel {
        category: Set(expense.category),
        item: Set(item.to_string()),
        report_date: Set(expense.report_date),
        occur_date: Set(expense.occur_date),
        invoice_no: Set(clean_optional(expense.invoice_no)),
        amount: Set(amount),
        summary: Set(clean_optional(expense.summary)),
        remark: Set(clean_optional(expense.remark)),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    info!(expense_id = created.id, "Expense recorded");
    Ok(created)
}

/// Lists expenses matching the filter, newest occur date first.
pub async fn list_expenses<C>(db: &C, filter: &ExpenseFilter) -> Result<Vec<expense_record::Model>>
where
    C: ConnectionTrait,
{
    let mut query = ExpenseRecord::find();
    if let Some(category) = filter.category {
        query = query.filter(expense_record::Column::Category.eq(category));
    }
    if let Some(from) = filter.from {
        query = query.filter(expense_record::Column::OccurDate.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(expense_record::Column::OccurDate.lte(to));
    }

    let records = query
        .order_by_desc(expense_record::Column::OccurDate)
        .order_by_desc(expense_record::Column::Id)
        .all(db)
        .await?;
    debug!(count = records.len(), "Expenses listed");
    Ok(records)
}

/// Deletes an expense record.
#[instrument(skip(db))]
pub async fn delete_expense<C>(db: &C, expense_id: i64) -> Result<expense_record::Model>
where
    C: ConnectionTrait,
{
    let record = ExpenseRecord::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or(Error::ExpenseNotFound { id: expense_id })?;

    ExpenseRecord::delete_by_id(expense_id).exec(db).await?;
    info!(expense_id, "Expense deleted");
    Ok(record)
}

/// Totals over every expense, by category and by item.
pub async fn expense_summary<C>(db: &C) -> Result<ExpenseSummary>
where
    C: ConnectionTrait,
{
    let records = ExpenseRecord::find().all(db).await?;

    let mut categories: Vec<CategoryTotal> = ExpenseCategory::ALL
        .iter()
        .map(|c| CategoryTotal {
            category: *c,
            label: c.label(),
            total: 0.0,
            count: 0,
            items: BTreeMap::new(),
        })
        .collect();

    for record in &records {
        if let Some(entry) = categories.iter_mut().find(|c| c.category == record.category) {
            entry.total += record.amount;
            entry.count += 1;
            *entry.items.entry(record.item.clone()).or_insert(0.0) += record.amount;
        }
    }

    for entry in &mut categories {
        entry.total = money::round_cents(entry.total);
        for value in entry.items.values_mut() {
            *value = money::round_cents(*value);
        }
    }

    Ok(ExpenseSummary {
        total: money::round_cents(categories.iter().map(|c| c.total).sum()),
        count: records.len(),
        categories,
    })
}
