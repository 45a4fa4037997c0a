// src/routes/employees.rs

use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use sqlx::{query, query_as};
use tracing::info;

use super::{optional_required, paging, required};
use crate::error::{ApiJson, AppError, AppResult};
use crate::models::Employee;
use crate::payroll::{ledger, WageBasis};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListEmployeesQ {
    pub q: Option<String>,
    pub wage_basis: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateEmployeeBody {
    pub name: String,
    pub gender: String,
    pub wage_basis: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct PatchEmployeeBody {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub wage_basis: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

fn check_gender(gender: &str) -> AppResult<String> {
    match gender.trim().to_uppercase().as_str() {
        g @ ("L" | "P") => Ok(g.to_string()),
        _ => Err(AppError::validation("gender must be 'L' or 'P'")),
    }
}

fn check_basis(basis: &str) -> AppResult<String> {
    Ok(basis.trim().parse::<WageBasis>()?.as_str().to_string())
}

pub async fn list_employees(
    State(state): State<AppState>,
    Query(q): Query<ListEmployeesQ>,
) -> AppResult<Json<Vec<Employee>>> {
    let (limit, offset) = paging(q.limit, q.offset);
    let basis = q.wage_basis.as_deref().map(check_basis).transpose()?;
    let pattern = q
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let rows = query_as::<_, Employee>(
        r#"SELECT * FROM public.employees
           WHERE ($1::TEXT IS NULL OR name ILIKE $1)
             AND ($2::TEXT IS NULL OR wage_basis = $2)
             AND ($3::BOOLEAN IS NULL OR is_active = $3)
           ORDER BY name, employee_id
           LIMIT $4 OFFSET $5"#)
        .bind(pattern).bind(basis).bind(q.active).bind(limit).bind(offset)
        .fetch_all(&state.pool).await?;
    Ok(Json(rows))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Employee>> {
    let row = query_as::<_, Employee>(r#"SELECT * FROM public.employees WHERE employee_id=$1"#)
        .bind(id).fetch_optional(&state.pool).await?
        .ok_or_else(|| AppError::not_found("employee", id))?;
    Ok(Json(row))
}

pub async fn create_employee(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<CreateEmployeeBody>,
) -> AppResult<Json<Employee>> {
    let name = required("name", &b.name)?;
    let gender = check_gender(&b.gender)?;
    let basis = check_basis(&b.wage_basis)?;

    let row = query_as::<_, Employee>(
        r#"
        INSERT INTO public.employees(name, gender, wage_basis, phone, address)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#
    )
    .bind(name).bind(gender).bind(basis).bind(b.phone).bind(b.address)
    .fetch_one(&state.pool).await?;
    info!(employee_id = row.employee_id, "employee created");
    Ok(Json(row))
}

pub async fn patch_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(b): ApiJson<PatchEmployeeBody>,
) -> AppResult<Json<Employee>> {
    let name = optional_required("name", b.name)?;
    let gender = b.gender.as_deref().map(check_gender).transpose()?;
    let basis = b.wage_basis.as_deref().map(check_basis).transpose()?;

    let mut tx = state.pool.begin().await?;
    let row = query_as::<_, Employee>(
        r#"
        UPDATE public.employees SET
          name = COALESCE($2, name),
          gender = COALESCE($3, gender),
          wage_basis = COALESCE($4, wage_basis),
          phone = COALESCE($5, phone),
          address = COALESCE($6, address),
          is_active = COALESCE($7, is_active),
          updated_at = now()
        WHERE employee_id = $1
        RETURNING *
        "#
    )
    .bind(id).bind(name).bind(gender).bind(&basis).bind(b.phone).bind(b.address).bind(b.is_active)
    .fetch_optional(&mut *tx).await?
    .ok_or_else(|| AppError::not_found("employee", id))?;

    // A new wage basis changes what open batches owe this employee.
    if basis.is_some() {
        let open: Vec<(i64,)> = query_as(
            r#"SELECT DISTINCT production_id FROM public.assignments WHERE employee_id=$1"#)
            .bind(id).fetch_all(&mut *tx).await?;
        let locked =
            ledger::lock_productions(&mut *tx, open.into_iter().map(|(id,)| id)).await?;
        for production in &locked {
            ledger::recompute_wages(&mut *tx, production.production_id).await?;
        }
        info!(employee_id = id, batches = locked.len(), "wage basis changed");
    }
    tx.commit().await?;
    Ok(Json(row))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let res = query(r#"DELETE FROM public.employees WHERE employee_id=$1"#)
        .bind(id).execute(&state.pool).await?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}
