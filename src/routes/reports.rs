// src/routes/reports.rs
//
// Read-only aggregations. Nothing here writes to the store.

use axum::{extract::{Query, State}, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow};

use super::{date_range, month_bounds};
use crate::error::AppResult;
use crate::payroll::completion_percent;
use crate::AppState;

#[derive(Deserialize)]
pub struct MonthQ {
    pub month: String,
}

#[derive(Deserialize)]
pub struct RangeQ {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ───────────────────────────────────────
// Attendance
// ───────────────────────────────────────

/// An employee counts as present on every day they logged progress.
#[derive(Debug, Serialize, FromRow)]
pub struct AttendanceRow {
    pub employee_id: i64,
    pub employee_name: String,
    pub days_present: i64,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceReport {
    pub month: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub employees: Vec<AttendanceRow>,
}

/// GET /api/v1/reports/attendance?month=YYYY-MM
pub async fn attendance(
    State(state): State<AppState>,
    Query(q): Query<MonthQ>,
) -> AppResult<Json<AttendanceReport>> {
    let (start, end) = month_bounds(&q.month)?;

    let employees = query_as::<_, AttendanceRow>(
        r#"
        SELECT e.employee_id, e.name AS employee_name,
               COUNT(DISTINCT g.work_date) AS days_present,
               COALESCE(
                   array_agg(DISTINCT g.work_date ORDER BY g.work_date)
                       FILTER (WHERE g.work_date IS NOT NULL),
                   '{}'
               ) AS dates
        FROM public.employees e
        LEFT JOIN public.assignments a ON a.employee_id = e.employee_id
        LEFT JOIN public.progress_entries g
               ON g.assignment_id = a.assignment_id
              AND g.work_date >= $1 AND g.work_date < $2
        WHERE e.is_active OR g.work_date IS NOT NULL
        GROUP BY e.employee_id, e.name
        ORDER BY e.name, e.employee_id
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(AttendanceReport {
        month: q.month.trim().to_string(),
        from: start,
        to: end.pred_opt().unwrap_or(start),
        employees,
    }))
}

// ───────────────────────────────────────
// Finance
// ───────────────────────────────────────

#[derive(Debug, Serialize, FromRow)]
pub struct FinanceLine {
    pub production_id: i64,
    pub production_name: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub wages_paid: Decimal,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct FinanceTotals {
    pub income: Decimal,
    pub expense: Decimal,
    pub wages_paid: Decimal,
    pub net: Decimal,
}

impl FinanceTotals {
    fn from_lines(lines: &[FinanceLine]) -> Self {
        let mut t = lines.iter().fold(Self::default(), |mut t, l| {
            t.income += l.income;
            t.expense += l.expense;
            t.wages_paid += l.wages_paid;
            t
        });
        t.net = t.income - t.expense - t.wages_paid;
        t
    }
}

#[derive(Debug, Serialize)]
pub struct FinanceReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub productions: Vec<FinanceLine>,
    pub totals: FinanceTotals,
}

/// GET /api/v1/reports/finance?from&to
///
/// Wages count once they are paid, on their payment date.
pub async fn finance_summary(
    State(state): State<AppState>,
    Query(q): Query<RangeQ>,
) -> AppResult<Json<FinanceReport>> {
    let (from, to) = date_range(q.from, q.to)?;

    let productions = query_as::<_, FinanceLine>(
        r#"
        WITH fin AS (
            SELECT production_id,
                   SUM(amount) FILTER (WHERE kind = 'pemasukan') AS income,
                   SUM(amount) FILTER (WHERE kind = 'pengeluaran') AS expense
            FROM public.finance_entries
            WHERE entry_date BETWEEN $1 AND $2
            GROUP BY production_id
        ), paid AS (
            SELECT production_id, SUM(total_wage) AS wages_paid
            FROM public.wage_records
            WHERE status = 'dibayar' AND paid_on BETWEEN $1 AND $2
            GROUP BY production_id
        )
        SELECT p.production_id, p.name AS production_name,
               COALESCE(fin.income, 0) AS income,
               COALESCE(fin.expense, 0) AS expense,
               COALESCE(paid.wages_paid, 0) AS wages_paid
        FROM public.productions p
        LEFT JOIN fin ON fin.production_id = p.production_id
        LEFT JOIN paid ON paid.production_id = p.production_id
        WHERE fin.production_id IS NOT NULL OR paid.production_id IS NOT NULL
        ORDER BY p.production_id
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(&state.pool)
    .await?;

    let totals = FinanceTotals::from_lines(&productions);
    Ok(Json(FinanceReport { from, to, productions, totals }))
}

// ───────────────────────────────────────
// Production
// ───────────────────────────────────────

#[derive(Debug, FromRow)]
struct ProductionRow {
    production_id: i64,
    name: String,
    status: String,
    total_units: i32,
    started_on: NaiveDate,
    finished_on: Option<NaiveDate>,
    target_units: i64,
    completed_units: i64,
    workers: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductionLine {
    pub production_id: i64,
    pub name: String,
    pub status: String,
    pub total_units: i32,
    pub started_on: NaiveDate,
    pub finished_on: Option<NaiveDate>,
    pub target_units: i64,
    pub completed_units: i64,
    pub percent: f64,
    pub workers: i64,
}

impl From<ProductionRow> for ProductionLine {
    fn from(r: ProductionRow) -> Self {
        Self {
            percent: completion_percent(r.completed_units, r.target_units),
            production_id: r.production_id,
            name: r.name,
            status: r.status,
            total_units: r.total_units,
            started_on: r.started_on,
            finished_on: r.finished_on,
            target_units: r.target_units,
            completed_units: r.completed_units,
            workers: r.workers,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductionReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub in_progress: usize,
    pub completed: usize,
    pub productions: Vec<ProductionLine>,
}

/// GET /api/v1/reports/production?from&to (batches started in the range)
pub async fn production_summary(
    State(state): State<AppState>,
    Query(q): Query<RangeQ>,
) -> AppResult<Json<ProductionReport>> {
    let (from, to) = date_range(q.from, q.to)?;

    let rows = query_as::<_, ProductionRow>(
        r#"
        SELECT p.production_id, p.name, p.status, p.total_units, p.started_on, p.finished_on,
               COALESCE(SUM(a.target_units), 0)::BIGINT AS target_units,
               COALESCE(SUM(a.units_completed), 0)::BIGINT AS completed_units,
               COUNT(DISTINCT a.employee_id) AS workers
        FROM public.productions p
        LEFT JOIN public.assignments a ON a.production_id = p.production_id
        WHERE p.started_on BETWEEN $1 AND $2
        GROUP BY p.production_id
        ORDER BY p.started_on DESC, p.production_id DESC
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(&state.pool)
    .await?;

    let productions: Vec<ProductionLine> = rows.into_iter().map(Into::into).collect();
    let completed = productions.iter().filter(|p| p.status == "selesai").count();
    Ok(Json(ProductionReport {
        from,
        to,
        in_progress: productions.len() - completed,
        completed,
        productions,
    }))
}

// ───────────────────────────────────────
// Wages
// ───────────────────────────────────────

#[derive(Debug, Serialize, FromRow)]
pub struct WageLine {
    pub employee_id: i64,
    pub employee_name: String,
    pub wage_basis: String,
    pub earned: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WageReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub employees: Vec<WageLine>,
    pub total_paid: Decimal,
    pub total_outstanding: Decimal,
}

/// GET /api/v1/reports/wages?from&to
///
/// `paid` covers payments dated inside the range; `outstanding` is whatever
/// is still unpaid right now, whenever it was earned.
pub async fn wage_summary(
    State(state): State<AppState>,
    Query(q): Query<RangeQ>,
) -> AppResult<Json<WageReport>> {
    let (from, to) = date_range(q.from, q.to)?;

    let employees = query_as::<_, WageLine>(
        r#"
        WITH w AS (
            SELECT employee_id,
                   COALESCE(SUM(total_wage) FILTER (
                       WHERE status = 'dibayar' AND paid_on BETWEEN $1 AND $2), 0) AS paid,
                   COALESCE(SUM(total_wage) FILTER (WHERE status = 'belum_dibayar'), 0) AS outstanding
            FROM public.wage_records
            GROUP BY employee_id
        )
        SELECT e.employee_id, e.name AS employee_name, e.wage_basis,
               w.paid + w.outstanding AS earned, w.paid, w.outstanding
        FROM w
        JOIN public.employees e ON e.employee_id = w.employee_id
        WHERE w.paid > 0 OR w.outstanding > 0
        ORDER BY e.name, e.employee_id
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(&state.pool)
    .await?;

    let total_paid = employees.iter().map(|e| e.paid).sum();
    let total_outstanding = employees.iter().map(|e| e.outstanding).sum();
    Ok(Json(WageReport { from, to, employees, total_paid, total_outstanding }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(income: i64, expense: i64, wages: i64) -> FinanceLine {
        FinanceLine {
            production_id: 1,
            production_name: "Kemeja".into(),
            income: Decimal::new(income, 0),
            expense: Decimal::new(expense, 0),
            wages_paid: Decimal::new(wages, 0),
        }
    }

    #[test]
    fn finance_totals_subtract_expenses_and_paid_wages() {
        let totals = FinanceTotals::from_lines(&[line(1_000_000, 200_000, 150_000), line(0, 50_000, 0)]);
        assert_eq!(totals.income, Decimal::new(1_000_000, 0));
        assert_eq!(totals.expense, Decimal::new(250_000, 0));
        assert_eq!(totals.wages_paid, Decimal::new(150_000, 0));
        assert_eq!(totals.net, Decimal::new(600_000, 0));
    }

    #[test]
    fn finance_totals_of_nothing_are_zero() {
        assert_eq!(FinanceTotals::from_lines(&[]), FinanceTotals::default());
    }

    #[test]
    fn production_line_carries_percent() {
        let row = ProductionRow {
            production_id: 7,
            name: "Batch".into(),
            status: "diproses".into(),
            total_units: 90,
            started_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            finished_on: None,
            target_units: 180,
            completed_units: 60,
            workers: 3,
        };
        let line = ProductionLine::from(row);
        assert_eq!(line.percent, 33.3);
        assert_eq!(line.workers, 3);
    }
}
