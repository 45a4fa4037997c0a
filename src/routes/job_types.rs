// src/routes/job_types.rs

use axum::{extract::{Path, Query, State}, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{query, query_as};
use tracing::info;

use super::{optional_required, required};
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::JobType;
use crate::payroll::ledger;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListJobTypesQ {
    pub origin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobTypeBody {
    pub name: String,
    pub piece_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct PatchJobTypeBody {
    pub name: Option<String>,
    pub piece_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
}

fn check_rates(piece_rate: Option<Decimal>, daily_rate: Option<Decimal>) -> AppResult<()> {
    if piece_rate.is_none() && daily_rate.is_none() {
        return Err(AppError::validation("a job type needs a piece_rate or a daily_rate"));
    }
    if piece_rate.is_some_and(|r| r.is_sign_negative()) || daily_rate.is_some_and(|r| r.is_sign_negative()) {
        return Err(AppError::validation("rates cannot be negative"));
    }
    Ok(())
}

pub async fn list_job_types(
    State(state): State<AppState>,
    Query(q): Query<ListJobTypesQ>,
) -> AppResult<Json<Vec<JobType>>> {
    if let Some(origin) = q.origin.as_deref() {
        if origin != "sistem" && origin != "manual" {
            return Err(AppError::validation("origin must be 'sistem' or 'manual'"));
        }
    }
    let rows = query_as::<_, JobType>(
        r#"SELECT * FROM public.job_types
           WHERE ($1::TEXT IS NULL OR origin = $1)
           ORDER BY origin DESC, name"#)
        .bind(q.origin)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}

pub async fn get_job_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<JobType>> {
    let row = query_as::<_, JobType>(r#"SELECT * FROM public.job_types WHERE job_type_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("job type", id))?;
    Ok(Json(row))
}

pub async fn create_job_type(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<CreateJobTypeBody>,
) -> AppResult<Json<JobType>> {
    let name = required("name", &b.name)?;
    check_rates(b.piece_rate, b.daily_rate)?;

    let row = query_as::<_, JobType>(
        r#"
        INSERT INTO public.job_types (name, piece_rate, daily_rate, origin)
        VALUES ($1, $2, $3, 'manual')
        RETURNING *
        "#
    )
    .bind(name)
    .bind(b.piece_rate)
    .bind(b.daily_rate)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(row))
}

/// Rate changes flow straight into the unpaid wages of every batch using
/// this job type.
pub async fn patch_job_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(b): ApiJson<PatchJobTypeBody>,
) -> AppResult<Json<JobType>> {
    let name = optional_required("name", b.name)?;
    if b.piece_rate.is_some_and(|r| r.is_sign_negative()) || b.daily_rate.is_some_and(|r| r.is_sign_negative()) {
        return Err(AppError::validation("rates cannot be negative"));
    }

    let mut tx = state.pool.begin().await?;
    let row = query_as::<_, JobType>(
        r#"
        UPDATE public.job_types
        SET name = COALESCE($2, name),
            piece_rate = COALESCE($3, piece_rate),
            daily_rate = COALESCE($4, daily_rate)
        WHERE job_type_id = $1
        RETURNING *
        "#
    )
    .bind(id)
    .bind(name)
    .bind(b.piece_rate)
    .bind(b.daily_rate)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("job type", id))?;

    if b.piece_rate.is_some() || b.daily_rate.is_some() {
        let affected: Vec<(i64,)> = query_as(
            r#"SELECT DISTINCT production_id FROM public.assignments WHERE job_type_id = $1"#)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let locked =
            ledger::lock_productions(&mut *tx, affected.into_iter().map(|(id,)| id)).await?;
        for production in &locked {
            ledger::recompute_wages(&mut *tx, production.production_id).await?;
        }
        info!(job_type_id = id, batches = locked.len(), "job type rates changed");
    }
    tx.commit().await?;
    Ok(Json(row))
}

pub async fn delete_job_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let origin: Option<(String,)> = query_as(r#"SELECT origin FROM public.job_types WHERE job_type_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    match origin {
        None => return Ok(Json(serde_json::json!({"deleted": false}))),
        Some((origin,)) if origin == "sistem" => {
            return Err(AppError::validation("built-in job types cannot be deleted"));
        }
        Some(_) => {}
    }

    let res = query(r#"DELETE FROM public.job_types WHERE job_type_id = $1 AND origin = 'manual'"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}
