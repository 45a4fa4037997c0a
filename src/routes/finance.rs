// src/routes/finance.rs

use axum::{extract::{Path, Query, State}, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{query, query_as};
use tracing::info;

use super::{optional_required, paging, required};
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::FinanceEntry;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListFinanceQ {
    pub production_id: Option<i64>,
    pub kind: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct FinanceItem {
    pub production_id: i64,
    pub kind: String,
    pub amount: Decimal,
    pub entry_date: NaiveDate,
    pub description: String,
}

#[derive(Deserialize)]
pub struct PatchFinanceBody {
    pub production_id: Option<i64>,
    pub kind: Option<String>,
    pub amount: Option<Decimal>,
    pub entry_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Income (`pemasukan`) or expense (`pengeluaran`).
fn check_kind(kind: &str) -> AppResult<&'static str> {
    match kind.trim() {
        "pemasukan" => Ok("pemasukan"),
        "pengeluaran" => Ok("pengeluaran"),
        other => Err(AppError::validation(format!(
            "kind must be 'pemasukan' or 'pengeluaran', got '{other}'"
        ))),
    }
}

fn check_amount(amount: Decimal) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("amount must be greater than zero"));
    }
    Ok(amount.round_dp(2))
}

struct CleanItem {
    production_id: i64,
    kind: &'static str,
    amount: Decimal,
    entry_date: NaiveDate,
    description: String,
}

fn clean(item: FinanceItem) -> AppResult<CleanItem> {
    Ok(CleanItem {
        production_id: item.production_id,
        kind: check_kind(&item.kind)?,
        amount: check_amount(item.amount)?,
        entry_date: item.entry_date,
        description: required("description", &item.description)?,
    })
}

async fn insert(conn: &mut sqlx::PgConnection, it: &CleanItem) -> AppResult<FinanceEntry> {
    let row = query_as::<_, FinanceEntry>(
        r#"
        INSERT INTO public.finance_entries (production_id, kind, amount, entry_date, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(it.production_id)
    .bind(it.kind)
    .bind(it.amount)
    .bind(it.entry_date)
    .bind(&it.description)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(q): Query<ListFinanceQ>,
) -> AppResult<Json<Vec<FinanceEntry>>> {
    let (limit, offset) = paging(q.limit, q.offset);
    let kind = q.kind.as_deref().map(check_kind).transpose()?;
    if let (Some(from), Some(to)) = (q.from, q.to) {
        if from > to {
            return Err(AppError::validation("'from' must not be after 'to'"));
        }
    }

    let rows = query_as::<_, FinanceEntry>(
        r#"SELECT * FROM public.finance_entries
           WHERE ($1::BIGINT IS NULL OR production_id = $1)
             AND ($2::TEXT IS NULL OR kind = $2)
             AND ($3::DATE IS NULL OR entry_date >= $3)
             AND ($4::DATE IS NULL OR entry_date <= $4)
           ORDER BY entry_date DESC, finance_id DESC
           LIMIT $5 OFFSET $6"#,
    )
    .bind(q.production_id)
    .bind(kind)
    .bind(q.from)
    .bind(q.to)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<FinanceEntry>> {
    let row = query_as::<_, FinanceEntry>(r#"SELECT * FROM public.finance_entries WHERE finance_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("finance entry", id))?;
    Ok(Json(row))
}

pub async fn create_entry(
    State(state): State<AppState>,
    ApiJson(item): ApiJson<FinanceItem>,
) -> AppResult<Json<FinanceEntry>> {
    let item = clean(item)?;
    let mut conn = state.pool.acquire().await?;
    let row = insert(&mut conn, &item).await?;
    Ok(Json(row))
}

/// POST /api/v1/finance/bulk: one transaction, any bad row rolls back all.
pub async fn bulk_create_entries(
    State(state): State<AppState>,
    ApiJson(items): ApiJson<Vec<FinanceItem>>,
) -> AppResult<Json<Vec<FinanceEntry>>> {
    if items.is_empty() {
        return Err(AppError::validation("at least one entry is required"));
    }
    let items = items
        .into_iter()
        .enumerate()
        .map(|(i, it)| {
            clean(it).map_err(|e| AppError::validation(format!("entry {}: {e}", i + 1)))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let mut tx = state.pool.begin().await?;
    let mut rows = Vec::with_capacity(items.len());
    for it in &items {
        rows.push(insert(&mut tx, it).await?);
    }
    tx.commit().await?;

    info!(count = rows.len(), "finance entries recorded");
    Ok(Json(rows))
}

pub async fn patch_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(b): ApiJson<PatchFinanceBody>,
) -> AppResult<Json<FinanceEntry>> {
    let kind = b.kind.as_deref().map(check_kind).transpose()?;
    let amount = b.amount.map(check_amount).transpose()?;
    let description = optional_required("description", b.description)?;

    let row = query_as::<_, FinanceEntry>(
        r#"
        UPDATE public.finance_entries
        SET production_id = COALESCE($2, production_id),
            kind = COALESCE($3, kind),
            amount = COALESCE($4, amount),
            entry_date = COALESCE($5, entry_date),
            description = COALESCE($6, description)
        WHERE finance_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.production_id)
    .bind(kind)
    .bind(amount)
    .bind(b.entry_date)
    .bind(description)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("finance entry", id))?;
    Ok(Json(row))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let res = query(r#"DELETE FROM public.finance_entries WHERE finance_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_accepts_only_known_values() {
        assert_eq!(check_kind(" pemasukan ").unwrap(), "pemasukan");
        assert_eq!(check_kind("pengeluaran").unwrap(), "pengeluaran");
        assert!(check_kind("income").is_err());
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(check_amount(Decimal::ZERO).is_err());
        assert!(check_amount(Decimal::new(-100, 0)).is_err());
        assert_eq!(check_amount(Decimal::new(150_005, 3)).unwrap(), Decimal::new(15_000, 2));
    }
}
