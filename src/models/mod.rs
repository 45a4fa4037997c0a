// src/models/mod.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ───────────────────────────────────────
// Accounts
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Reference data: employees & job types
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub employee_id: i64,
    pub name: String,
    pub gender: String,             // L | P
    pub wage_basis: String,         // borongan | harian
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct JobType {
    pub job_type_id: i64,
    pub name: String,
    pub piece_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub origin: String,             // sistem | manual
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Production batches & work
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Production {
    pub production_id: i64,
    pub name: String,
    pub color: String,
    pub size: String,
    pub total_units: i32,
    pub deadline: Option<NaiveDate>,
    pub status: String,             // diproses | selesai
    pub started_on: NaiveDate,
    pub finished_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment row joined with the names a client needs to render it.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub assignment_id: i64,
    pub production_id: i64,
    pub production_name: String,
    pub employee_id: i64,
    pub employee_name: String,
    pub job_type_id: i64,
    pub job_type_name: String,
    pub target_units: i32,
    pub units_completed: i32,
    pub status: String,             // dikerjakan | selesai
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ProgressEntry {
    pub progress_id: i64,
    pub assignment_id: i64,
    pub work_date: NaiveDate,
    pub units: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Progress entry with the assignment context flattened in.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ProgressLine {
    pub progress_id: i64,
    pub assignment_id: i64,
    pub work_date: NaiveDate,
    pub units: i32,
    pub note: Option<String>,
    pub employee_id: i64,
    pub employee_name: String,
    pub production_id: i64,
    pub production_name: String,
    pub job_type_name: String,
}

// ───────────────────────────────────────
// Money
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct WageRecord {
    pub wage_id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub production_id: i64,
    pub production_name: String,
    pub total_wage: Decimal,
    pub status: String,             // belum_dibayar | dibayar
    pub paid_on: Option<NaiveDate>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct FinanceEntry {
    pub finance_id: i64,
    pub production_id: i64,
    pub kind: String,               // pemasukan | pengeluaran
    pub amount: Decimal,
    pub entry_date: NaiveDate,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// DTOs helpful for endpoints
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub target_units: i64,
    pub completed_units: i64,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct ProductionDetail {
    #[serde(flatten)]
    pub production: Production,
    pub progress: ProgressSummary,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WageRecomputeResult {
    pub production_id: i64,
    pub records_written: usize,
    pub total_outstanding: Decimal,
}
