// src/payroll/distribution.rs

use std::collections::HashSet;

use serde::Serialize;

use super::PayrollError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitShare {
    pub employee_id: i64,
    pub target_units: i32,
}

/// A roster must name at least one employee, each at most once.
pub fn validate_roster(employee_ids: &[i64]) -> Result<(), PayrollError> {
    if employee_ids.is_empty() {
        return Err(PayrollError::NoEmployees);
    }
    let mut seen = HashSet::with_capacity(employee_ids.len());
    for id in employee_ids {
        if !seen.insert(*id) {
            return Err(PayrollError::DuplicateEmployee(*id));
        }
    }
    Ok(())
}

/// Splits `total_units` across `employee_ids` in the given order.
///
/// Everyone gets `total / k`; the last employee also takes `total % k`, so
/// the targets always add back up to `total_units`.
pub fn distribute_units(
    total_units: i32,
    employee_ids: &[i64],
) -> Result<Vec<UnitShare>, PayrollError> {
    validate_roster(employee_ids)?;
    if total_units < 0 {
        return Err(PayrollError::NegativeUnits(total_units.into()));
    }

    // Lengths beyond i32::MAX cannot be stored as assignments anyway.
    let k = i32::try_from(employee_ids.len()).unwrap_or(i32::MAX);
    let base = total_units / k;
    let remainder = total_units % k;
    let last = employee_ids.len() - 1;

    Ok(employee_ids
        .iter()
        .enumerate()
        .map(|(i, &employee_id)| UnitShare {
            employee_id,
            target_units: if i == last { base + remainder } else { base },
        })
        .collect())
}
