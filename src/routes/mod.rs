// src/routes/mod.rs

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::require_session;
use crate::error::{AppError, AppResult};
use crate::AppState;

pub mod assignments;
pub mod auth;
pub mod dashboard;
pub mod employees;
pub mod finance;
pub mod health;
pub mod job_types;
pub mod productions;
pub mod progress;
pub mod reports;
pub mod wages;

pub fn router(state: AppState) -> Router {
    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        // session
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // employees
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route(
            "/employees/:id",
            get(employees::get_employee)
                .patch(employees::patch_employee)
                .delete(employees::delete_employee),
        )
        // job types
        .route(
            "/job-types",
            get(job_types::list_job_types).post(job_types::create_job_type),
        )
        .route(
            "/job-types/:id",
            get(job_types::get_job_type)
                .patch(job_types::patch_job_type)
                .delete(job_types::delete_job_type),
        )
        // production batches
        .route(
            "/productions",
            get(productions::list_productions).post(productions::create_production),
        )
        .route(
            "/productions/:id",
            get(productions::get_production)
                .patch(productions::patch_production)
                .delete(productions::delete_production),
        )
        .route("/productions/:id/complete", post(productions::complete_production))
        .route("/productions/:id/assignments", post(assignments::assign_production))
        .route(
            "/productions/:id/assignments/:job_type_id",
            delete(assignments::unassign_job_type),
        )
        .route("/productions/:id/wages/recompute", post(wages::recompute_production_wages))
        // assignments & progress
        .route("/assignments", get(assignments::list_assignments))
        .route("/assignments/:id", get(assignments::get_assignment))
        .route(
            "/assignments/:id/progress",
            get(progress::list_assignment_progress).post(progress::record_progress),
        )
        .route("/progress", get(progress::list_progress))
        // wages
        .route("/wages", get(wages::list_wages))
        .route("/wages/pay", post(wages::pay_wages))
        .route("/wages/:id/pay", patch(wages::pay_wage))
        // finance
        .route("/finance", get(finance::list_entries).post(finance::create_entry))
        .route("/finance/bulk", post(finance::bulk_create_entries))
        .route(
            "/finance/:id",
            get(finance::get_entry)
                .patch(finance::patch_entry)
                .delete(finance::delete_entry),
        )
        // dashboard & reports
        .route("/dashboard", get(dashboard::dashboard))
        .route("/reports/attendance", get(reports::attendance))
        .route("/reports/finance", get(reports::finance_summary))
        .route("/reports/production", get(reports::production_summary))
        .route("/reports/wages", get(reports::wage_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .merge(protected);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ───────────────────────────────────────
// Shared input helpers
// ───────────────────────────────────────

/// Clamps list paging the same way on every endpoint.
pub(crate) fn paging(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 500), offset.unwrap_or(0).max(0))
}

/// Trimmed, non-empty text field.
pub(crate) fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Like `required`, for fields that may be left out of a patch.
pub(crate) fn optional_required(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    value.map(|v| required(field, &v)).transpose()
}

/// `YYYY-MM` → `[first day, first day of next month)`.
pub(crate) fn month_bounds(month: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::validation(format!("month must look like YYYY-MM, got '{month}'"));
    let (y, m) = month.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month_no: u32 = m.parse().map_err(|_| invalid())?;
    let start = NaiveDate::from_ymd_opt(year, month_no, 1).ok_or_else(invalid)?;
    let end = if month_no == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month_no + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((start, end))
}

/// Inclusive date range; defaults to the current month up to today.
pub(crate) fn date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let today = Utc::now().date_naive();
    let from = from.unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let to = to.unwrap_or(today);
    if from > to {
        return Err(AppError::validation(format!(
            "'from' ({from}) must not be after 'to' ({to})"
        )));
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(paging(None, None), (50, 0));
        assert_eq!(paging(Some(0), Some(-4)), (1, 0));
        assert_eq!(paging(Some(10_000), Some(20)), (500, 20));
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Kemeja  ").unwrap(), "Kemeja");
        assert_eq!(
            required("name", "   ").unwrap_err().to_string(),
            "name is required"
        );
        assert!(optional_required("name", None).unwrap().is_none());
        assert!(optional_required("name", Some(" ".into())).is_err());
    }

    #[test]
    fn month_bounds_handles_december() {
        assert_eq!(month_bounds("2026-02").unwrap(), (d(2026, 2, 1), d(2026, 3, 1)));
        assert_eq!(month_bounds("2025-12").unwrap(), (d(2025, 12, 1), d(2026, 1, 1)));
    }

    #[test]
    fn month_bounds_rejects_garbage() {
        for bad in ["2026", "2026-13", "2026-00", "abcd-01", ""] {
            assert!(month_bounds(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        assert!(date_range(Some(d(2026, 5, 2)), Some(d(2026, 5, 1))).is_err());
        let (from, to) = date_range(Some(d(2026, 5, 1)), Some(d(2026, 5, 1))).unwrap();
        assert_eq!(from, to);
    }
}
