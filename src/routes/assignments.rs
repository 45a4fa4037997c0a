// src/routes/assignments.rs

use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, PgConnection};
use tracing::info;

use super::paging;
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::{Assignment, WageRecomputeResult};
use crate::payroll::{
    derive_assignment_status, distribute_units, ledger, validate_roster, AssignmentStatus,
    ProductionStatus,
};
use crate::AppState;

/// Assignment columns plus the names of what they point at.
pub(crate) const ASSIGNMENT_SELECT: &str = r#"
    SELECT a.assignment_id, a.production_id, p.name AS production_name,
           a.employee_id, e.name AS employee_name,
           a.job_type_id, j.name AS job_type_name,
           a.target_units, a.units_completed, a.status, a.created_at
    FROM public.assignments a
    JOIN public.productions p ON p.production_id = a.production_id
    JOIN public.employees e ON e.employee_id = a.employee_id
    JOIN public.job_types j ON j.job_type_id = a.job_type_id"#;

#[derive(Deserialize)]
pub struct ListQ {
    pub production_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub job_type_id: i64,
    /// Order matters: the last employee absorbs the remainder.
    pub employee_ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct AssignResult {
    pub production_id: i64,
    pub job_type_id: i64,
    pub assignments: Vec<Assignment>,
    pub wages: WageRecomputeResult,
}

pub async fn list_assignments(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> AppResult<Json<Vec<Assignment>>> {
    let (limit, offset) = paging(q.limit, q.offset);
    let status = q
        .status
        .as_deref()
        .map(|s| s.parse::<AssignmentStatus>().map(|s| s.as_str()))
        .transpose()?;

    let rows = query_as::<_, Assignment>(&format!(
        r#"{ASSIGNMENT_SELECT}
           WHERE ($1::BIGINT IS NULL OR a.production_id = $1)
             AND ($2::BIGINT IS NULL OR a.employee_id = $2)
             AND ($3::TEXT IS NULL OR a.status = $3)
           ORDER BY a.production_id DESC, j.name, a.assignment_id
           LIMIT $4 OFFSET $5"#
    ))
    .bind(q.production_id)
    .bind(q.employee_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Assignment>> {
    let row = query_as::<_, Assignment>(&format!("{ASSIGNMENT_SELECT} WHERE a.assignment_id = $1"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("assignment", id))?;
    Ok(Json(row))
}

/// POST /api/v1/productions/:id/assignments
///
/// Splits the batch's units for one job type across the given employees,
/// replacing whatever split existed before, as long as nobody in that split
/// has reported progress yet.
pub async fn assign_production(
    State(state): State<AppState>,
    Path(production_id): Path<i64>,
    ApiJson(b): ApiJson<AssignBody>,
) -> AppResult<Json<AssignResult>> {
    validate_roster(&b.employee_ids)?;

    let mut tx = state.pool.begin().await?;
    let production = ledger::lock_production(&mut *tx, production_id).await?;
    ensure_open(production.status.parse()?)?;

    let job_type: Option<(i64,)> =
        query_as(r#"SELECT job_type_id FROM public.job_types WHERE job_type_id = $1"#)
            .bind(b.job_type_id)
            .fetch_optional(&mut *tx)
            .await?;
    if job_type.is_none() {
        return Err(AppError::not_found("job type", b.job_type_id));
    }

    let active: Vec<(i64,)> = query_as(
        r#"SELECT employee_id FROM public.employees
           WHERE employee_id = ANY($1) AND is_active"#,
    )
    .bind(&b.employee_ids)
    .fetch_all(&mut *tx)
    .await?;
    if let Some(missing) = b
        .employee_ids
        .iter()
        .find(|id| !active.iter().any(|(found,)| found == *id))
    {
        return Err(AppError::NotFound(format!("active employee {missing}")));
    }

    ensure_untouched(&mut *tx, production_id, b.job_type_id).await?;
    query(r#"DELETE FROM public.assignments WHERE production_id = $1 AND job_type_id = $2"#)
        .bind(production_id)
        .bind(b.job_type_id)
        .execute(&mut *tx)
        .await?;

    let shares = distribute_units(production.total_units, &b.employee_ids)?;
    for share in &shares {
        query(
            r#"
            INSERT INTO public.assignments
                (production_id, employee_id, job_type_id, target_units, units_completed, status)
            VALUES ($1, $2, $3, $4, 0, $5)
            "#,
        )
        .bind(production_id)
        .bind(share.employee_id)
        .bind(b.job_type_id)
        .bind(share.target_units)
        .bind(derive_assignment_status(0, share.target_units).as_str())
        .execute(&mut *tx)
        .await?;
    }

    let wages = ledger::recompute_wages(&mut *tx, production_id).await?;
    ledger::refresh_production_status(&mut *tx, production_id).await?;

    let assignments = query_as::<_, Assignment>(&format!(
        "{ASSIGNMENT_SELECT} WHERE a.production_id = $1 AND a.job_type_id = $2 ORDER BY a.assignment_id"
    ))
    .bind(production_id)
    .bind(b.job_type_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        production_id,
        job_type_id = b.job_type_id,
        employees = shares.len(),
        total_units = production.total_units,
        "units distributed"
    );

    Ok(Json(AssignResult {
        production_id,
        job_type_id: b.job_type_id,
        assignments,
        wages,
    }))
}

/// DELETE /api/v1/productions/:id/assignments/:job_type_id
pub async fn unassign_job_type(
    State(state): State<AppState>,
    Path((production_id, job_type_id)): Path<(i64, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    let mut tx = state.pool.begin().await?;
    let production = ledger::lock_production(&mut *tx, production_id).await?;
    ensure_open(production.status.parse()?)?;
    ensure_untouched(&mut *tx, production_id, job_type_id).await?;

    let res = query(r#"DELETE FROM public.assignments WHERE production_id = $1 AND job_type_id = $2"#)
        .bind(production_id)
        .bind(job_type_id)
        .execute(&mut *tx)
        .await?;

    ledger::recompute_wages(&mut *tx, production_id).await?;
    let status = ledger::refresh_production_status(&mut *tx, production_id).await?;
    tx.commit().await?;
    Ok(Json(serde_json::json!({
        "deleted": res.rows_affected(),
        "production_status": status,
    })))
}

pub(crate) fn ensure_open(status: ProductionStatus) -> AppResult<()> {
    if status == ProductionStatus::Completed {
        return Err(AppError::validation("the batch is already finished"));
    }
    Ok(())
}

async fn ensure_untouched(
    conn: &mut PgConnection,
    production_id: i64,
    job_type_id: i64,
) -> AppResult<()> {
    let (started,): (i64,) = query_as(
        r#"SELECT COUNT(*) FROM public.assignments
           WHERE production_id = $1 AND job_type_id = $2 AND units_completed > 0"#,
    )
    .bind(production_id)
    .bind(job_type_id)
    .fetch_one(&mut *conn)
    .await?;
    if started > 0 {
        return Err(AppError::validation(
            "work on this job type has already been reported; its split can no longer change",
        ));
    }
    Ok(())
}
