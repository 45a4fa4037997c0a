// src/routes/productions.rs

use axum::{extract::{Path, Query, State}, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{query, query_as};
use tracing::info;

use super::assignments::{ensure_open, ASSIGNMENT_SELECT};
use super::{optional_required, paging, required};
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::{Assignment, Production, ProductionDetail, ProgressSummary};
use crate::payroll::{completion_percent, ledger, ProductionStatus};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListProductionsQ {
    pub status: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateProductionBody {
    pub name: String,
    pub color: String,
    pub size: String,
    pub total_units: i32,
    pub deadline: Option<NaiveDate>,
    pub started_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct PatchProductionBody {
    pub name: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub total_units: Option<i32>,
    pub deadline: Option<NaiveDate>,
    pub started_on: Option<NaiveDate>,
    pub finished_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CompleteBody {
    pub finished_on: Option<NaiveDate>,
}

pub async fn list_productions(
    State(state): State<AppState>,
    Query(q): Query<ListProductionsQ>,
) -> AppResult<Json<Vec<Production>>> {
    let (limit, offset) = paging(q.limit, q.offset);
    let status = q
        .status
        .as_deref()
        .map(|s| s.parse::<ProductionStatus>().map(|s| s.as_str()))
        .transpose()?;
    let pattern = q
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let rows = query_as::<_, Production>(
        r#"SELECT * FROM public.productions
           WHERE ($1::TEXT IS NULL OR status = $1)
             AND ($2::TEXT IS NULL OR name ILIKE $2)
           ORDER BY started_on DESC, production_id DESC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(status)
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

pub async fn get_production(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ProductionDetail>> {
    let production = query_as::<_, Production>(
        r#"SELECT * FROM public.productions WHERE production_id = $1"#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("production", id))?;

    let assignments = query_as::<_, Assignment>(&format!(
        "{ASSIGNMENT_SELECT} WHERE a.production_id = $1 ORDER BY j.name, a.assignment_id"
    ))
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let target_units: i64 = assignments.iter().map(|a| i64::from(a.target_units)).sum();
    let completed_units: i64 = assignments.iter().map(|a| i64::from(a.units_completed)).sum();

    Ok(Json(ProductionDetail {
        production,
        progress: ProgressSummary {
            target_units,
            completed_units,
            percent: completion_percent(completed_units, target_units),
        },
        assignments,
    }))
}

pub async fn create_production(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<CreateProductionBody>,
) -> AppResult<Json<Production>> {
    let name = required("name", &b.name)?;
    let color = required("color", &b.color)?;
    let size = required("size", &b.size)?;
    if b.total_units <= 0 {
        return Err(AppError::validation("total_units must be greater than zero"));
    }
    let started_on = b.started_on.unwrap_or_else(|| Utc::now().date_naive());
    check_dates(started_on, b.deadline, None)?;

    let row = query_as::<_, Production>(
        r#"
        INSERT INTO public.productions (name, color, size, total_units, deadline, started_on, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(color)
    .bind(size)
    .bind(b.total_units)
    .bind(b.deadline)
    .bind(started_on)
    .bind(b.notes)
    .fetch_one(&state.pool)
    .await?;

    info!(production_id = row.production_id, total_units = row.total_units, "production created");
    Ok(Json(row))
}

pub async fn patch_production(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(b): ApiJson<PatchProductionBody>,
) -> AppResult<Json<Production>> {
    let name = optional_required("name", b.name)?;
    let color = optional_required("color", b.color)?;
    let size = optional_required("size", b.size)?;
    if b.total_units.is_some_and(|n| n <= 0) {
        return Err(AppError::validation("total_units must be greater than zero"));
    }

    let mut tx = state.pool.begin().await?;
    let current = ledger::lock_production(&mut *tx, id).await?;

    if let Some(total) = b.total_units {
        if total != current.total_units {
            let (assigned,): (i64,) = query_as(
                r#"SELECT COUNT(*) FROM public.assignments WHERE production_id = $1"#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if assigned > 0 {
                return Err(AppError::validation(
                    "total_units cannot change once the batch has assignments",
                ));
            }
        }
    }

    let started_on = b.started_on.unwrap_or(current.started_on);
    check_dates(
        started_on,
        b.deadline.or(current.deadline),
        b.finished_on.or(current.finished_on),
    )?;
    if started_on > current.started_on {
        check_first_progress(&mut *tx, id, started_on).await?;
    }

    query(
        r#"
        UPDATE public.productions
        SET name = COALESCE($2, name),
            color = COALESCE($3, color),
            size = COALESCE($4, size),
            total_units = COALESCE($5, total_units),
            deadline = COALESCE($6, deadline),
            started_on = COALESCE($7, started_on),
            finished_on = COALESCE($8, finished_on),
            notes = COALESCE($9, notes),
            updated_at = now()
        WHERE production_id = $1
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(color)
    .bind(size)
    .bind(b.total_units)
    .bind(b.deadline)
    .bind(b.started_on)
    .bind(b.finished_on)
    .bind(b.notes)
    .execute(&mut *tx)
    .await?;

    ledger::refresh_production_status(&mut *tx, id).await?;
    let row = fetch_production(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(Json(row))
}

/// Closes a batch explicitly. Without a body the batch finishes today.
pub async fn complete_production(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<ApiJson<CompleteBody>>,
) -> AppResult<Json<Production>> {
    let CompleteBody { finished_on } = body.map(|ApiJson(b)| b).unwrap_or_default();
    let finished_on = finished_on.unwrap_or_else(|| Utc::now().date_naive());

    let mut tx = state.pool.begin().await?;
    let current = ledger::lock_production(&mut *tx, id).await?;
    ensure_open(current.status.parse()?)?;
    check_dates(current.started_on, None, Some(finished_on))?;

    query(
        r#"UPDATE public.productions SET finished_on = $2, updated_at = now()
           WHERE production_id = $1"#,
    )
    .bind(id)
    .bind(finished_on)
    .execute(&mut *tx)
    .await?;

    ledger::refresh_production_status(&mut *tx, id).await?;
    let row = fetch_production(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(Json(row))
}

pub async fn delete_production(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let mut tx = state.pool.begin().await?;
    let (paid,): (i64,) = query_as(
        r#"SELECT COUNT(*) FROM public.wage_records
           WHERE production_id = $1 AND status = 'dibayar'"#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    if paid > 0 {
        return Err(AppError::validation(
            "a batch with paid wages cannot be deleted",
        ));
    }

    let res = query(r#"DELETE FROM public.productions WHERE production_id = $1"#)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}

/// Deadline and finish date may not precede the start date.
fn check_dates(
    started_on: NaiveDate,
    deadline: Option<NaiveDate>,
    finished_on: Option<NaiveDate>,
) -> AppResult<()> {
    if deadline.is_some_and(|d| d < started_on) {
        return Err(AppError::validation("deadline cannot be before the start date"));
    }
    if finished_on.is_some_and(|d| d < started_on) {
        return Err(AppError::validation("finished_on cannot be before the start date"));
    }
    Ok(())
}

/// A later start date may not strand progress already recorded before it.
async fn check_first_progress(
    conn: &mut sqlx::PgConnection,
    production_id: i64,
    started_on: NaiveDate,
) -> AppResult<()> {
    let (first,): (Option<NaiveDate>,) = query_as(
        r#"SELECT MIN(g.work_date)
           FROM public.progress_entries g
           JOIN public.assignments a ON a.assignment_id = g.assignment_id
           WHERE a.production_id = $1"#,
    )
    .bind(production_id)
    .fetch_one(&mut *conn)
    .await?;
    match first {
        Some(first) if first < started_on => Err(AppError::validation(format!(
            "started_on cannot be after the first recorded progress ({first})"
        ))),
        _ => Ok(()),
    }
}

async fn fetch_production(conn: &mut sqlx::PgConnection, id: i64) -> AppResult<Production> {
    query_as::<_, Production>(r#"SELECT * FROM public.productions WHERE production_id = $1"#)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("production", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, day).unwrap()
    }

    #[test]
    fn dates_on_or_after_start_pass() {
        assert!(check_dates(d(10), None, None).is_ok());
        assert!(check_dates(d(10), Some(d(10)), Some(d(12))).is_ok());
    }

    #[test]
    fn deadline_before_start_is_rejected() {
        let err = check_dates(d(10), Some(d(9)), None).unwrap_err();
        assert_eq!(err.to_string(), "deadline cannot be before the start date");
    }

    #[test]
    fn finish_before_start_is_rejected() {
        let err = check_dates(d(10), Some(d(20)), Some(d(3))).unwrap_err();
        assert_eq!(err.to_string(), "finished_on cannot be before the start date");
    }
}
