//! Student entity - one row per enrolled student.
//!
//! Holds the owed ("应交") amount for each fee category, plus `agency_paid`, the
//! running counter of money paid into the agency-fee wallet. Every other paid
//! figure is derived from the payment ledger.

use super::FeeType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    /// Unique identifier for the student
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Class name, e.g. "三年1班"
    pub class_name: String,
    /// Student name
    pub student_name: String,
    /// Gender as entered by staff
    pub gender: Option<String>,
    /// Owed tuition
    pub tuition_fee: f64,
    /// Owed lunch fee
    pub lunch_fee: f64,
    /// Owed nap fee
    pub nap_fee: f64,
    /// Owed after-school fee
    pub after_school_fee: f64,
    /// Owed club fee
    pub club_fee: f64,
    /// Agency-fee wallet capacity
    pub agency_fee: f64,
    /// Money paid into the agency-fee wallet, kept in lockstep with agency payments
    pub agency_paid: f64,
    /// Free-text remark
    pub remark: Option<String>,
    /// When the student was created
    pub created_at: DateTimeUtc,
    /// When the student was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Owed amount for a fee type.
    #[must_use]
    pub const fn owed(&self, fee_type: FeeType) -> f64 {
        match fee_type {
            FeeType::Tuition => self.tuition_fee,
            FeeType::Lunch => self.lunch_fee,
            FeeType::Nap => self.nap_fee,
            FeeType::AfterSchool => self.after_school_fee,
            FeeType::Club => self.club_fee,
            FeeType::Agency => self.agency_fee,
        }
    }

    /// Sum of all six owed amounts.
    #[must_use]
    pub fn total_owed(&self) -> f64 {
        FeeType::ALL.iter().map(|ft| self.owed(*ft)).sum()
    }
}

/// Defines relationships between Student and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One student has many payment records
    #[sea_orm(has_many = "super::payment_record::Entity")]
    PaymentRecords,
    /// One student has many agency fee deductions
    #[sea_orm(has_many = "super::agency_fee_deduction::Entity")]
    AgencyFeeDeductions,
}

impl Related<super::payment_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentRecords.def()
    }
}

impl Related<super::agency_fee_deduction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AgencyFeeDeductions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
