/// Agency-fee wallet and deduction log
pub mod agency;
/// Class name parsing, ordering and promotion naming
pub mod class_name;
/// School expense ledger
pub mod expense;
/// Class deletion and full data wipe
pub mod maintenance;
/// Cent rounding and amount validation
pub mod money;
/// Payment ledger and overspend guard
pub mod payment;
/// Annual class promotion
pub mod promotion;
/// Read-only fee statistics
pub mod statistics;
/// Students and their obligations
pub mod student;
/// Bulk import and export
pub mod transfer;
