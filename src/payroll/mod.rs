//! Business rules for splitting batches into assignments and turning
//! finished work into wages.
//!
//! The pure rules (`distribution`, `wages`, `status`) know nothing about the
//! store; `ledger` applies them inside a caller-owned transaction.

pub mod distribution;
pub mod ledger;
pub mod status;
pub mod wages;

use thiserror::Error;

pub use distribution::{distribute_units, validate_roster, UnitShare};
pub use status::{
    completion_percent, derive_assignment_status, derive_production_status, AssignmentStatus,
    ProductionStatus,
};
pub use wages::{assignment_wage, outstanding_wage, PaymentStatus, RateCard, WageBasis, WorkDone};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayrollError {
    #[error("at least one employee is required")]
    NoEmployees,

    #[error("employee {0} is listed more than once")]
    DuplicateEmployee(i64),

    #[error("unit count cannot be negative (got {0})")]
    NegativeUnits(i64),

    #[error("unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },
}
