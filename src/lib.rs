//! Data layer for a services company: timesheets, approvals, invoicing,
//! payroll and settings over a pluggable key-value store.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod utils;
