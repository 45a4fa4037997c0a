// src/payroll/ledger.rs
//
// Store-side half of payroll: every function takes the caller's connection
// so it runs inside whatever transaction the handler opened.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{query, query_as, FromRow, PgConnection};
use tracing::{debug, info};

use super::status::{derive_production_status, ProductionStatus};
use super::wages::{employee_batch_wage, outstanding_wage, RateCard, WageBasis, WorkDone};
use crate::error::AppError;
use crate::models::{Production, WageRecomputeResult};

#[derive(FromRow)]
struct WorkRow {
    employee_id: i64,
    wage_basis: String,
    piece_rate: Option<Decimal>,
    daily_rate: Option<Decimal>,
    units_completed: i32,
    work_dates: Vec<NaiveDate>,
}

/// Locks the batch row for the rest of the transaction.
pub async fn lock_production(
    conn: &mut PgConnection,
    production_id: i64,
) -> Result<Production, AppError> {
    query_as::<_, Production>(
        r#"SELECT production_id, name, color, size, total_units, deadline, status,
                  started_on, finished_on, notes, created_at, updated_at
           FROM public.productions WHERE production_id = $1
           FOR UPDATE"#,
    )
    .bind(production_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("production", production_id))
}

/// Locks several batches, always in ascending id order.
///
/// Every writer of wage records holds the lock of the record's batch.
pub async fn lock_productions(
    conn: &mut PgConnection,
    production_ids: impl IntoIterator<Item = i64>,
) -> Result<Vec<Production>, AppError> {
    let ids: BTreeSet<i64> = production_ids.into_iter().collect();
    let mut locked = Vec::with_capacity(ids.len());
    for id in ids {
        locked.push(lock_production(&mut *conn, id).await?);
    }
    Ok(locked)
}

/// Rebuilds the unpaid wage records of one batch from its assignments.
///
/// Paid records stay as they are; each employee gets at most one unpaid
/// record holding whatever the paid ones do not already cover.
pub async fn recompute_wages(
    conn: &mut PgConnection,
    production_id: i64,
) -> Result<WageRecomputeResult, AppError> {
    let rows = query_as::<_, WorkRow>(
        r#"
        SELECT a.employee_id, e.wage_basis, j.piece_rate, j.daily_rate, a.units_completed,
               COALESCE(
                   (SELECT array_agg(DISTINCT p.work_date)
                      FROM public.progress_entries p
                     WHERE p.assignment_id = a.assignment_id),
                   '{}'::DATE[]
               ) AS work_dates
        FROM public.assignments a
        JOIN public.employees e ON e.employee_id = a.employee_id
        JOIN public.job_types j ON j.job_type_id = a.job_type_id
        WHERE a.production_id = $1
        ORDER BY a.employee_id, a.assignment_id
        "#,
    )
    .bind(production_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut work_by_employee: BTreeMap<i64, Vec<WorkDone>> = BTreeMap::new();
    for row in rows {
        let basis: WageBasis = row.wage_basis.parse()?;
        work_by_employee.entry(row.employee_id).or_default().push(WorkDone {
            basis,
            rates: RateCard { piece_rate: row.piece_rate, daily_rate: row.daily_rate },
            units_completed: row.units_completed,
            work_dates: row.work_dates,
        });
    }

    let paid: BTreeMap<i64, Decimal> = query_as::<_, (i64, Decimal)>(
        r#"SELECT employee_id, COALESCE(SUM(total_wage), 0)::NUMERIC
           FROM public.wage_records
           WHERE production_id = $1 AND status = 'dibayar'
           GROUP BY employee_id"#,
    )
    .bind(production_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .collect();

    query(r#"DELETE FROM public.wage_records WHERE production_id = $1 AND status = 'belum_dibayar'"#)
        .bind(production_id)
        .execute(&mut *conn)
        .await?;

    let mut records_written = 0;
    let mut total_outstanding = Decimal::ZERO;
    for (employee_id, works) in &work_by_employee {
        let computed = employee_batch_wage(works);
        let already_paid = paid.get(employee_id).copied().unwrap_or(Decimal::ZERO);
        let owed = outstanding_wage(computed, already_paid);
        if owed.is_zero() {
            continue;
        }
        query(
            r#"INSERT INTO public.wage_records (employee_id, production_id, total_wage, status)
               VALUES ($1, $2, $3, 'belum_dibayar')"#,
        )
        .bind(*employee_id)
        .bind(production_id)
        .bind(owed)
        .execute(&mut *conn)
        .await?;
        records_written += 1;
        total_outstanding += owed;
    }

    debug!(
        production_id,
        employees = work_by_employee.len(),
        records_written,
        total_outstanding = %total_outstanding,
        "wages recomputed"
    );

    Ok(WageRecomputeResult { production_id, records_written, total_outstanding })
}

/// Re-derives the batch status from its finish date and assignment totals
/// and moves it to `selesai` when warranted.
pub async fn refresh_production_status(
    conn: &mut PgConnection,
    production_id: i64,
) -> Result<ProductionStatus, AppError> {
    let (stored, finished_on, completed, target): (String, Option<NaiveDate>, i64, i64) = query_as(
        r#"
        SELECT p.status, p.finished_on,
               COALESCE(SUM(a.units_completed), 0)::BIGINT,
               COALESCE(SUM(a.target_units), 0)::BIGINT
        FROM public.productions p
        LEFT JOIN public.assignments a ON a.production_id = p.production_id
        WHERE p.production_id = $1
        GROUP BY p.production_id, p.status, p.finished_on
        "#,
    )
    .bind(production_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("production", production_id))?;

    // One-way: a finished batch never drops back to in-progress.
    if stored.parse::<ProductionStatus>()? == ProductionStatus::Completed {
        return Ok(ProductionStatus::Completed);
    }

    let status = derive_production_status(finished_on, completed, target);
    if status == ProductionStatus::Completed {
        let res = query(
            r#"UPDATE public.productions
                  SET status = 'selesai', updated_at = now()
                WHERE production_id = $1 AND status = 'diproses'"#,
        )
        .bind(production_id)
        .execute(&mut *conn)
        .await?;

        if res.rows_affected() > 0 {
            info!(production_id, completed, target, "production completed");
        }
    }
    Ok(status)
}
