// src/routes/wages.rs

use std::collections::HashSet;

use axum::{extract::{Path, Query, State}, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{query, query_as};
use tracing::info;

use super::paging;
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::{WageRecomputeResult, WageRecord};
use crate::payroll::{ledger, PaymentStatus};
use crate::AppState;

const WAGE_SELECT: &str = r#"
    SELECT w.wage_id, w.employee_id, e.name AS employee_name,
           w.production_id, p.name AS production_name,
           w.total_wage, w.status, w.paid_on, w.computed_at
    FROM public.wage_records w
    JOIN public.employees e ON e.employee_id = w.employee_id
    JOIN public.productions p ON p.production_id = w.production_id"#;

#[derive(Deserialize)]
pub struct ListWagesQ {
    pub production_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct PayBody {
    pub paid_on: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct PayManyBody {
    pub wage_ids: Vec<i64>,
    pub paid_on: Option<NaiveDate>,
}

pub async fn list_wages(
    State(state): State<AppState>,
    Query(q): Query<ListWagesQ>,
) -> AppResult<Json<Vec<WageRecord>>> {
    let (limit, offset) = paging(q.limit, q.offset);
    let status = q
        .status
        .as_deref()
        .map(|s| s.parse::<PaymentStatus>().map(|s| s.as_str()))
        .transpose()?;

    let rows = query_as::<_, WageRecord>(&format!(
        r#"{WAGE_SELECT}
           WHERE ($1::BIGINT IS NULL OR w.production_id = $1)
             AND ($2::BIGINT IS NULL OR w.employee_id = $2)
             AND ($3::TEXT IS NULL OR w.status = $3)
           ORDER BY w.computed_at DESC, w.wage_id DESC
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

/// PATCH /api/v1/wages/:id/pay
pub async fn pay_wage(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<ApiJson<PayBody>>,
) -> AppResult<Json<WageRecord>> {
    let PayBody { paid_on } = body.map(|ApiJson(b)| b).unwrap_or_default();
    let paid_on = paid_on.unwrap_or_else(|| Utc::now().date_naive());

    let mut tx = state.pool.begin().await?;
    let (production_id,): (i64,) =
        query_as(r#"SELECT production_id FROM public.wage_records WHERE wage_id = $1"#)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("wage record", id))?;
    ledger::lock_production(&mut *tx, production_id).await?;

    // A recompute that held the batch may have replaced the record.
    let (status,): (String,) =
        query_as(r#"SELECT status FROM public.wage_records WHERE wage_id = $1 FOR UPDATE"#)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("wage record", id))?;
    if status.parse::<PaymentStatus>()? == PaymentStatus::Paid {
        return Err(AppError::validation(format!("wage record {id} is already paid")));
    }

    query(r#"UPDATE public.wage_records SET status = 'dibayar', paid_on = $2 WHERE wage_id = $1"#)
        .bind(id)
        .bind(paid_on)
        .execute(&mut *tx)
        .await?;

    let row = query_as::<_, WageRecord>(&format!("{WAGE_SELECT} WHERE w.wage_id = $1"))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(wage_id = id, amount = %row.total_wage, %paid_on, "wage paid");
    Ok(Json(row))
}

/// POST /api/v1/wages/pay: all listed records are paid, or none are.
pub async fn pay_wages(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<PayManyBody>,
) -> AppResult<Json<Vec<WageRecord>>> {
    if b.wage_ids.is_empty() {
        return Err(AppError::validation("wage_ids cannot be empty"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = b.wage_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::validation(format!("wage record {dup} is listed twice")));
    }
    let paid_on = b.paid_on.unwrap_or_else(|| Utc::now().date_naive());

    let mut tx = state.pool.begin().await?;
    let batches: Vec<(i64,)> = query_as(
        r#"SELECT DISTINCT production_id FROM public.wage_records WHERE wage_id = ANY($1)"#,
    )
    .bind(&b.wage_ids)
    .fetch_all(&mut *tx)
    .await?;
    ledger::lock_productions(&mut *tx, batches.into_iter().map(|(id,)| id)).await?;

    let found: Vec<(i64, String)> = query_as(
        r#"SELECT wage_id, status FROM public.wage_records
           WHERE wage_id = ANY($1) FOR UPDATE"#,
    )
    .bind(&b.wage_ids)
    .fetch_all(&mut *tx)
    .await?;

    for id in &b.wage_ids {
        let (_, status) = found
            .iter()
            .find(|(wage_id, _)| wage_id == id)
            .ok_or_else(|| AppError::not_found("wage record", *id))?;
        if status.parse::<PaymentStatus>()? == PaymentStatus::Paid {
            return Err(AppError::validation(format!("wage record {id} is already paid")));
        }
    }

    query(
        r#"UPDATE public.wage_records SET status = 'dibayar', paid_on = $2
           WHERE wage_id = ANY($1)"#,
    )
    .bind(&b.wage_ids)
    .bind(paid_on)
    .execute(&mut *tx)
    .await?;

    let rows = query_as::<_, WageRecord>(&format!(
        "{WAGE_SELECT} WHERE w.wage_id = ANY($1) ORDER BY w.wage_id"
    ))
    .bind(&b.wage_ids)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(count = rows.len(), %paid_on, "wages paid");
    Ok(Json(rows))
}

/// POST /api/v1/productions/:id/wages/recompute
pub async fn recompute_production_wages(
    State(state): State<AppState>,
    Path(production_id): Path<i64>,
) -> AppResult<Json<WageRecomputeResult>> {
    let mut tx = state.pool.begin().await?;
    ledger::lock_production(&mut *tx, production_id).await?;
    let result = ledger::recompute_wages(&mut *tx, production_id).await?;
    tx.commit().await?;
    Ok(Json(result))
}
