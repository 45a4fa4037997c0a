// src/payroll/wages.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PayrollError;

/// How an employee is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WageBasis {
    /// Per finished piece ("borongan").
    #[serde(rename = "borongan")]
    Piece,
    /// Flat amount per working day ("harian").
    #[serde(rename = "harian")]
    Daily,
}

impl WageBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            WageBasis::Piece => "borongan",
            WageBasis::Daily => "harian",
        }
    }
}

impl FromStr for WageBasis {
    type Err = PayrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borongan" => Ok(WageBasis::Piece),
            "harian" => Ok(WageBasis::Daily),
            other => Err(PayrollError::UnknownValue {
                field: "wage_basis",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for WageBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "belum_dibayar")]
    Unpaid,
    #[serde(rename = "dibayar")]
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "belum_dibayar",
            PaymentStatus::Paid => "dibayar",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = PayrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "belum_dibayar" => Ok(PaymentStatus::Unpaid),
            "dibayar" => Ok(PaymentStatus::Paid),
            other => Err(PayrollError::UnknownValue {
                field: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

/// Rates a job type pays. At least one is set for every stored job type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateCard {
    pub piece_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
}

/// What one assignment has produced so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDone {
    pub basis: WageBasis,
    pub rates: RateCard,
    pub units_completed: i32,
    /// Distinct dates with progress on this assignment.
    pub work_dates: Vec<NaiveDate>,
}

/// The rate a piece of work is paid at.
///
/// The employee's basis picks the rate; when the job type lacks that rate
/// the other one is used, and with neither the work earns nothing.
fn applied_rate(work: &WorkDone) -> Option<(WageBasis, Decimal)> {
    let piece = work.rates.piece_rate.map(|r| (WageBasis::Piece, r));
    let daily = work.rates.daily_rate.map(|r| (WageBasis::Daily, r));
    match work.basis {
        WageBasis::Piece => piece.or(daily),
        WageBasis::Daily => daily.or(piece),
    }
}

/// Wage earned by a single assignment.
pub fn assignment_wage(work: &WorkDone) -> Decimal {
    employee_batch_wage(std::iter::once(work))
}

/// Total for one employee across all of their assignments in a batch.
///
/// Piece work adds up per assignment. Daily work pays each calendar day once,
/// at the highest daily rate among the assignments worked that day.
pub fn employee_batch_wage<'a, I>(works: I) -> Decimal
where
    I: IntoIterator<Item = &'a WorkDone>,
{
    let mut piece_total = Decimal::ZERO;
    let mut day_rates: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

    for work in works {
        match applied_rate(work) {
            Some((WageBasis::Piece, rate)) => {
                piece_total += rate * Decimal::from(work.units_completed.max(0));
            }
            Some((WageBasis::Daily, rate)) => {
                for day in &work.work_dates {
                    let best = day_rates.entry(*day).or_insert(rate);
                    *best = (*best).max(rate);
                }
            }
            None => {}
        }
    }

    (piece_total + day_rates.values().copied().sum::<Decimal>()).round_dp(2)
}

/// What is still owed once paid records are taken into account.
pub fn outstanding_wage(computed: Decimal, already_paid: Decimal) -> Decimal {
    (computed - already_paid).max(Decimal::ZERO)
}
