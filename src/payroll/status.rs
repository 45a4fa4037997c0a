// src/payroll/status.rs

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::PayrollError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionStatus {
    #[serde(rename = "diproses")]
    InProgress,
    #[serde(rename = "selesai")]
    Completed,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::InProgress => "diproses",
            ProductionStatus::Completed => "selesai",
        }
    }
}

impl FromStr for ProductionStatus {
    type Err = PayrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diproses" => Ok(ProductionStatus::InProgress),
            "selesai" => Ok(ProductionStatus::Completed),
            other => Err(PayrollError::UnknownValue {
                field: "production status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    #[serde(rename = "dikerjakan")]
    Assigned,
    #[serde(rename = "selesai")]
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "dikerjakan",
            AssignmentStatus::Completed => "selesai",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = PayrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dikerjakan" => Ok(AssignmentStatus::Assigned),
            "selesai" => Ok(AssignmentStatus::Completed),
            other => Err(PayrollError::UnknownValue {
                field: "assignment status",
                value: other.to_string(),
            }),
        }
    }
}

/// A batch is finished once someone closes it with a date, or once every
/// assigned unit has been reported. A batch nobody is assigned to only
/// finishes by date.
pub fn derive_production_status(
    finished_on: Option<NaiveDate>,
    completed_units: i64,
    target_units: i64,
) -> ProductionStatus {
    if finished_on.is_some() || (target_units > 0 && completed_units >= target_units) {
        ProductionStatus::Completed
    } else {
        ProductionStatus::InProgress
    }
}

pub fn derive_assignment_status(units_completed: i32, target_units: i32) -> AssignmentStatus {
    if units_completed >= target_units {
        AssignmentStatus::Completed
    } else {
        AssignmentStatus::Assigned
    }
}

/// Percentage done, one decimal place, capped at 100.
pub fn completion_percent(completed: i64, target: i64) -> f64 {
    if target <= 0 {
        return 0.0;
    }
    let pct = (completed.max(0) as f64 / target as f64 * 100.0).min(100.0);
    (pct * 10.0).round() / 10.0
}
