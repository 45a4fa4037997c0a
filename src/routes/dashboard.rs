// src/routes/dashboard.rs

use axum::{extract::State, Json};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{query_as, FromRow};

use crate::error::AppResult;
use crate::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct Dashboard {
    pub active_employees: i64,
    pub productions_in_progress: i64,
    pub productions_completed: i64,
    pub unpaid_wages: Decimal,
    pub income_this_month: Decimal,
    pub expense_this_month: Decimal,
    pub units_today: i64,
}

pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);

    let row = query_as::<_, Dashboard>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM public.employees WHERE is_active) AS active_employees,
            (SELECT COUNT(*) FROM public.productions WHERE status = 'diproses') AS productions_in_progress,
            (SELECT COUNT(*) FROM public.productions WHERE status = 'selesai') AS productions_completed,
            (SELECT COALESCE(SUM(total_wage), 0) FROM public.wage_records
              WHERE status = 'belum_dibayar') AS unpaid_wages,
            (SELECT COALESCE(SUM(amount), 0) FROM public.finance_entries
              WHERE kind = 'pemasukan' AND entry_date BETWEEN $1 AND $2) AS income_this_month,
            (SELECT COALESCE(SUM(amount), 0) FROM public.finance_entries
              WHERE kind = 'pengeluaran' AND entry_date BETWEEN $1 AND $2) AS expense_this_month,
            (SELECT COALESCE(SUM(units), 0)::BIGINT FROM public.progress_entries
              WHERE work_date = $2) AS units_today
        "#,
    )
    .bind(month_start)
    .bind(today)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(row))
}
