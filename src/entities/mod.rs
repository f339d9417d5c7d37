//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod agency_fee_deduction;
pub mod enums;
pub mod expense_record;
pub mod payment_record;
pub mod student;
pub mod system_state;

pub use enums::{AgencyItem, ExpenseCategory, FeeType};

// Re-export specific types to avoid conflicts
pub use agency_fee_deduction::{
    Column as AgencyFeeDeductionColumn, Entity as AgencyFeeDeduction,
    Model as AgencyFeeDeductionModel,
};
pub use expense_record::{
    Column as ExpenseRecordColumn, Entity as ExpenseRecord, Model as ExpenseRecordModel,
};
pub use payment_record::{
    Column as PaymentRecordColumn, Entity as PaymentRecord, Model as PaymentRecordModel,
};
pub use student::{Column as StudentColumn, Entity as Student, Model as StudentModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
