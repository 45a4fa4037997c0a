// src/routes/progress.rs

use axum::{extract::{Path, Query, State}, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as};
use tracing::info;

use super::assignments::ASSIGNMENT_SELECT;
use super::date_range;
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::{Assignment, ProgressEntry, ProgressLine};
use crate::payroll::{derive_assignment_status, ledger, ProductionStatus};
use crate::AppState;

#[derive(Deserialize)]
pub struct RecordProgressBody {
    pub work_date: NaiveDate,
    pub units: i32,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct ListProgressQ {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub employee_id: Option<i64>,
    pub production_id: Option<i64>,
}

#[derive(Serialize)]
pub struct RecordProgressResult {
    pub entry: ProgressEntry,
    pub assignment: Assignment,
    pub production_status: ProductionStatus,
}

/// POST /api/v1/assignments/:id/progress
pub async fn record_progress(
    State(state): State<AppState>,
    Path(assignment_id): Path<i64>,
    ApiJson(b): ApiJson<RecordProgressBody>,
) -> AppResult<Json<RecordProgressResult>> {
    if b.units <= 0 {
        return Err(AppError::validation("units must be greater than zero"));
    }
    if b.work_date > Utc::now().date_naive() {
        return Err(AppError::validation("work_date cannot be in the future"));
    }
    let note = b.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    let mut tx = state.pool.begin().await?;

    let (production_id,): (i64,) =
        query_as(r#"SELECT production_id FROM public.assignments WHERE assignment_id = $1"#)
            .bind(assignment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("assignment", assignment_id))?;

    // Batch first, then assignment: the same order every writer uses.
    let production = ledger::lock_production(&mut *tx, production_id).await?;
    if production.status.parse::<ProductionStatus>()? == ProductionStatus::Completed {
        return Err(AppError::validation("the batch is already finished"));
    }
    if b.work_date < production.started_on {
        return Err(AppError::validation(format!(
            "work_date cannot be before the batch started ({})",
            production.started_on
        )));
    }

    let (target_units, units_completed): (i32, i32) = query_as(
        r#"SELECT target_units, units_completed FROM public.assignments
           WHERE assignment_id = $1 FOR UPDATE"#,
    )
    .bind(assignment_id)
    .fetch_one(&mut *tx)
    .await?;

    let remaining = target_units - units_completed;
    if b.units > remaining {
        return Err(AppError::validation(format!(
            "only {remaining} units remain on this assignment"
        )));
    }

    let entry = query_as::<_, ProgressEntry>(
        r#"
        INSERT INTO public.progress_entries (assignment_id, work_date, units, note)
        VALUES ($1, $2, $3, $4)
        RETURNING progress_id, assignment_id, work_date, units, note, created_at
        "#,
    )
    .bind(assignment_id)
    .bind(b.work_date)
    .bind(b.units)
    .bind(note)
    .fetch_one(&mut *tx)
    .await?;

    let completed = units_completed + b.units;
    query(
        r#"UPDATE public.assignments SET units_completed = $2, status = $3
           WHERE assignment_id = $1"#,
    )
    .bind(assignment_id)
    .bind(completed)
    .bind(derive_assignment_status(completed, target_units).as_str())
    .execute(&mut *tx)
    .await?;

    ledger::recompute_wages(&mut *tx, production_id).await?;
    let production_status = ledger::refresh_production_status(&mut *tx, production_id).await?;

    let assignment = query_as::<_, Assignment>(&format!("{ASSIGNMENT_SELECT} WHERE a.assignment_id = $1"))
        .bind(assignment_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        assignment_id,
        production_id,
        units = b.units,
        completed,
        target_units,
        "progress recorded"
    );
    Ok(Json(RecordProgressResult { entry, assignment, production_status }))
}

pub async fn list_assignment_progress(
    State(state): State<AppState>,
    Path(assignment_id): Path<i64>,
) -> AppResult<Json<Vec<ProgressEntry>>> {
    let exists: Option<(i64,)> =
        query_as(r#"SELECT assignment_id FROM public.assignments WHERE assignment_id = $1"#)
            .bind(assignment_id)
            .fetch_optional(&state.pool)
            .await?;
    if exists.is_none() {
        return Err(AppError::not_found("assignment", assignment_id));
    }

    let rows = query_as::<_, ProgressEntry>(
        r#"SELECT progress_id, assignment_id, work_date, units, note, created_at
           FROM public.progress_entries
           WHERE assignment_id = $1
           ORDER BY work_date, progress_id"#,
    )
    .bind(assignment_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

/// GET /api/v1/progress?from&to&employee_id&production_id
pub async fn list_progress(
    State(state): State<AppState>,
    Query(q): Query<ListProgressQ>,
) -> AppResult<Json<Vec<ProgressLine>>> {
    let (from, to) = date_range(q.from, q.to)?;
    let rows = query_as::<_, ProgressLine>(
        r#"
        SELECT g.progress_id, g.assignment_id, g.work_date, g.units, g.note,
               a.employee_id, e.name AS employee_name,
               a.production_id, p.name AS production_name,
               j.name AS job_type_name
        FROM public.progress_entries g
        JOIN public.assignments a ON a.assignment_id = g.assignment_id
        JOIN public.employees e ON e.employee_id = a.employee_id
        JOIN public.productions p ON p.production_id = a.production_id
        JOIN public.job_types j ON j.job_type_id = a.job_type_id
        WHERE g.work_date BETWEEN $1 AND $2
          AND ($3::BIGINT IS NULL OR a.employee_id = $3)
          AND ($4::BIGINT IS NULL OR a.production_id = $4)
        ORDER BY g.work_date DESC, e.name, g.progress_id
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(q.employee_id)
    .bind(q.production_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}
