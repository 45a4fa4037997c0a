//! End-to-end flows against a real Postgres. `#[sqlx::test]` creates a fresh
//! database per test from `DATABASE_URL` and applies the migrations.

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::{query_as, PgPool};
use tower::ServiceExt;

use konveksi_api::{auth::SessionStore, payroll::ledger, router, AppState};

fn app(pool: PgPool) -> (Router, String) {
    let state = AppState::new(pool, SessionStore::new(12), false);
    let token = state
        .sessions
        .create(1, "admin", "Administrator", "admin")
        .expect("session");
    (router(state), format!("workshop_session={token}"))
}

fn request(method: &str, uri: &str, cookie: &str, body: Option<Value>) -> Request<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie);
    match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_ago(n: i64) -> NaiveDate {
    today() - chrono::Duration::days(n)
}

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

// ───────────────────────────────────────
// Fixtures
// ───────────────────────────────────────

async fn employee(pool: &PgPool, name: &str, basis: &str) -> i64 {
    let (id,): (i64,) = query_as(
        r#"INSERT INTO public.employees (name, gender, wage_basis)
           VALUES ($1, 'P', $2) RETURNING employee_id"#,
    )
    .bind(name)
    .bind(basis)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn job_type(pool: &PgPool, name: &str, piece: Option<i64>, daily: Option<i64>) -> i64 {
    let (id,): (i64,) = query_as(
        r#"INSERT INTO public.job_types (name, piece_rate, daily_rate)
           VALUES ($1, $2, $3) RETURNING job_type_id"#,
    )
    .bind(name)
    .bind(piece.map(dec))
    .bind(daily.map(dec))
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn production(pool: &PgPool, total_units: i32, started_on: NaiveDate) -> i64 {
    let (id,): (i64,) = query_as(
        r#"INSERT INTO public.productions (name, color, size, total_units, started_on)
           VALUES ('Kemeja PDH', 'Navy', 'L', $1, $2) RETURNING production_id"#,
    )
    .bind(total_units)
    .bind(started_on)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn assignment_id(pool: &PgPool, production_id: i64, job_type_id: i64, employee_id: i64) -> i64 {
    let (id,): (i64,) = query_as(
        r#"SELECT assignment_id FROM public.assignments
           WHERE production_id = $1 AND job_type_id = $2 AND employee_id = $3"#,
    )
    .bind(production_id)
    .bind(job_type_id)
    .bind(employee_id)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

/// (paid, unpaid) totals for one employee on one batch.
async fn wage_totals(pool: &PgPool, production_id: i64, employee_id: i64) -> (Decimal, Decimal) {
    query_as(
        r#"SELECT COALESCE(SUM(total_wage) FILTER (WHERE status = 'dibayar'), 0),
                  COALESCE(SUM(total_wage) FILTER (WHERE status = 'belum_dibayar'), 0)
           FROM public.wage_records WHERE production_id = $1 AND employee_id = $2"#,
    )
    .bind(production_id)
    .bind(employee_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn production_status(pool: &PgPool, production_id: i64) -> String {
    let (status,): (String,) =
        query_as(r#"SELECT status FROM public.productions WHERE production_id = $1"#)
            .bind(production_id)
            .fetch_one(pool)
            .await
            .unwrap();
    status
}

async fn assign(app: &Router, cookie: &str, production_id: i64, job_type_id: i64, employees: &[i64]) {
    let (status, body) = send(
        app,
        request(
            "POST",
            &format!("/api/v1/productions/{production_id}/assignments"),
            cookie,
            Some(json!({ "job_type_id": job_type_id, "employee_ids": employees })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

async fn report(app: &Router, cookie: &str, assignment_id: i64, work_date: NaiveDate, units: i32) {
    let (status, body) = send(
        app,
        request(
            "POST",
            &format!("/api/v1/assignments/{assignment_id}/progress"),
            cookie,
            Some(json!({ "work_date": work_date, "units": units })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

/// Holds the batch row lock while `req` runs, checks that the request is
/// still waiting, then releases the lock and returns the response.
async fn blocked_by_batch_lock(
    pool: &PgPool,
    app: &Router,
    production_id: i64,
    req: Request<Body>,
) -> StatusCode {
    let mut tx = pool.begin().await.unwrap();
    ledger::lock_production(&mut *tx, production_id).await.unwrap();

    let handle = tokio::spawn(app.clone().oneshot(req));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished(), "request went ahead while the batch was locked");

    tx.rollback().await.unwrap();
    let resp = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("request never resumed")
        .unwrap()
        .unwrap();
    resp.status()
}

// ───────────────────────────────────────
// Wages
// ───────────────────────────────────────

#[sqlx::test(migrations = "./migrations")]
async fn paid_wages_are_not_counted_twice(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let rina = employee(&pool, "Rina", "borongan").await;
    let sewing = job_type(&pool, "Jahit Kerah", Some(2000), None).await;
    let batch = production(&pool, 10, days_ago(2)).await;

    assign(&app, &cookie, batch, sewing, &[siti, rina]).await;
    let siti_work = assignment_id(&pool, batch, sewing, siti).await;
    report(&app, &cookie, siti_work, days_ago(1), 3).await;

    let (wage_id,): (i64,) = query_as(
        r#"SELECT wage_id FROM public.wage_records WHERE production_id = $1 AND employee_id = $2"#,
    )
    .bind(batch)
    .bind(siti)
    .fetch_one(&pool)
    .await
    .unwrap();
    let (status, _) = send(
        &app,
        request("PATCH", &format!("/api/v1/wages/{wage_id}/pay"), &cookie, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wage_totals(&pool, batch, siti).await, (dec(6000), dec(0)));

    report(&app, &cookie, siti_work, today(), 2).await;
    assert_eq!(wage_totals(&pool, batch, siti).await, (dec(6000), dec(4000)));

    let (status, body) = send(
        &app,
        request("POST", &format!("/api/v1/productions/{batch}/wages/recompute"), &cookie, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records_written"], 1);

    // 5 units × 2000, split across the paid and the unpaid record.
    let (paid, unpaid) = wage_totals(&pool, batch, siti).await;
    assert_eq!(paid + unpaid, dec(10_000));
    assert_eq!(unpaid, dec(4000));
}

#[sqlx::test(migrations = "./migrations")]
async fn daily_rate_is_paid_once_per_day(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let dewi = employee(&pool, "Dewi", "harian").await;
    let ironing = job_type(&pool, "Setrika", None, Some(85_000)).await;
    let packing = job_type(&pool, "Packing", None, Some(70_000)).await;
    let batch = production(&pool, 20, days_ago(3)).await;

    assign(&app, &cookie, batch, ironing, &[dewi]).await;
    assign(&app, &cookie, batch, packing, &[dewi]).await;
    let iron = assignment_id(&pool, batch, ironing, dewi).await;
    let pack = assignment_id(&pool, batch, packing, dewi).await;

    report(&app, &cookie, iron, days_ago(1), 5).await;
    report(&app, &cookie, pack, days_ago(1), 5).await;
    report(&app, &cookie, pack, today(), 5).await;

    // Yesterday at the better rate, today at the packing rate.
    assert_eq!(wage_totals(&pool, batch, dewi).await, (dec(0), dec(155_000)));
}

#[sqlx::test(migrations = "./migrations")]
async fn paying_one_wage_waits_for_the_batch(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let batch = production(&pool, 10, today()).await;
    let (wage_id,): (i64,) = query_as(
        r#"INSERT INTO public.wage_records (employee_id, production_id, total_wage)
           VALUES ($1, $2, 5000) RETURNING wage_id"#,
    )
    .bind(siti)
    .bind(batch)
    .fetch_one(&pool)
    .await
    .unwrap();

    let req = request("PATCH", &format!("/api/v1/wages/{wage_id}/pay"), &cookie, None);
    assert_eq!(blocked_by_batch_lock(&pool, &app, batch, req).await, StatusCode::OK);
    assert_eq!(wage_totals(&pool, batch, siti).await, (dec(5000), dec(0)));
}

#[sqlx::test(migrations = "./migrations")]
async fn paying_many_wages_waits_for_every_batch(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let first = production(&pool, 10, today()).await;
    let second = production(&pool, 10, today()).await;
    let ids: Vec<(i64,)> = query_as(
        r#"INSERT INTO public.wage_records (employee_id, production_id, total_wage)
           VALUES ($1, $2, 5000), ($1, $3, 7000) RETURNING wage_id"#,
    )
    .bind(siti)
    .bind(first)
    .bind(second)
    .fetch_all(&pool)
    .await
    .unwrap();
    let wage_ids: Vec<i64> = ids.into_iter().map(|(id,)| id).collect();

    let req = request(
        "POST",
        "/api/v1/wages/pay",
        &cookie,
        Some(json!({ "wage_ids": wage_ids })),
    );
    assert_eq!(blocked_by_batch_lock(&pool, &app, second, req).await, StatusCode::OK);
    assert_eq!(wage_totals(&pool, second, siti).await, (dec(7000), dec(0)));
}

#[sqlx::test(migrations = "./migrations")]
async fn rate_change_recomputes_under_the_batch_lock(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let cutting = job_type(&pool, "Potong Pola", Some(1000), None).await;
    let batch = production(&pool, 8, days_ago(1)).await;
    assign(&app, &cookie, batch, cutting, &[siti]).await;
    let work = assignment_id(&pool, batch, cutting, siti).await;
    report(&app, &cookie, work, today(), 4).await;

    let req = request(
        "PATCH",
        &format!("/api/v1/job-types/{cutting}"),
        &cookie,
        Some(json!({ "piece_rate": "1500" })),
    );
    assert_eq!(blocked_by_batch_lock(&pool, &app, batch, req).await, StatusCode::OK);
    assert_eq!(wage_totals(&pool, batch, siti).await, (dec(0), dec(6000)));
}

#[sqlx::test(migrations = "./migrations")]
async fn basis_change_recomputes_under_the_batch_lock(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let finishing = job_type(&pool, "Finishing Kancing", Some(500), Some(80_000)).await;
    let batch = production(&pool, 10, days_ago(1)).await;
    assign(&app, &cookie, batch, finishing, &[siti]).await;
    let work = assignment_id(&pool, batch, finishing, siti).await;
    report(&app, &cookie, work, today(), 10).await;
    assert_eq!(wage_totals(&pool, batch, siti).await, (dec(0), dec(5000)));

    let req = request(
        "PATCH",
        &format!("/api/v1/employees/{siti}"),
        &cookie,
        Some(json!({ "wage_basis": "harian" })),
    );
    assert_eq!(blocked_by_batch_lock(&pool, &app, batch, req).await, StatusCode::OK);
    assert_eq!(wage_totals(&pool, batch, siti).await, (dec(0), dec(80_000)));
}

// ───────────────────────────────────────
// Batch status
// ───────────────────────────────────────

#[sqlx::test(migrations = "./migrations")]
async fn unassigning_the_unfinished_job_completes_the_batch(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let cutting = job_type(&pool, "Potong Pola", Some(1000), None).await;
    let sewing = job_type(&pool, "Jahit Badan", Some(3500), None).await;
    let batch = production(&pool, 4, days_ago(1)).await;

    assign(&app, &cookie, batch, cutting, &[siti]).await;
    assign(&app, &cookie, batch, sewing, &[siti]).await;
    let cut = assignment_id(&pool, batch, cutting, siti).await;
    report(&app, &cookie, cut, today(), 4).await;
    assert_eq!(production_status(&pool, batch).await, "diproses");

    let (status, body) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/v1/productions/{batch}/assignments/{sewing}"),
            &cookie,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["production_status"], "selesai");
    assert_eq!(production_status(&pool, batch).await, "selesai");
}

#[sqlx::test(migrations = "./migrations")]
async fn completing_twice_keeps_the_first_date(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let batch = production(&pool, 10, days_ago(5)).await;
    let uri = format!("/api/v1/productions/{batch}/complete");

    let (status, body) = send(
        &app,
        request("POST", &uri, &cookie, Some(json!({ "finished_on": days_ago(2) }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "selesai");

    let (status, _) = send(
        &app,
        request("POST", &uri, &cookie, Some(json!({ "finished_on": today() }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (finished_on,): (Option<NaiveDate>,) =
        query_as(r#"SELECT finished_on FROM public.productions WHERE production_id = $1"#)
            .bind(batch)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(finished_on, Some(days_ago(2)));
}

#[sqlx::test(migrations = "./migrations")]
async fn start_date_cannot_move_past_recorded_progress(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let siti = employee(&pool, "Siti", "borongan").await;
    let cutting = job_type(&pool, "Potong Pola", Some(1000), None).await;
    let batch = production(&pool, 10, days_ago(5)).await;
    assign(&app, &cookie, batch, cutting, &[siti]).await;
    let work = assignment_id(&pool, batch, cutting, siti).await;
    report(&app, &cookie, work, days_ago(4), 2).await;

    let uri = format!("/api/v1/productions/{batch}");
    let (status, body) = send(
        &app,
        request("PATCH", &uri, &cookie, Some(json!({ "started_on": days_ago(2) }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("first recorded progress"));

    let (status, _) = send(
        &app,
        request("PATCH", &uri, &cookie, Some(json!({ "deadline": days_ago(6) }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request("PATCH", &uri, &cookie, Some(json!({ "started_on": days_ago(4) }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ───────────────────────────────────────
// Finance
// ───────────────────────────────────────

#[sqlx::test(migrations = "./migrations")]
async fn bulk_finance_rolls_back_on_a_bad_row(pool: PgPool) {
    let (app, cookie) = app(pool.clone());
    let batch = production(&pool, 10, today()).await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/finance/bulk",
            &cookie,
            Some(json!([
                { "production_id": batch, "kind": "pemasukan", "amount": "1500000",
                  "entry_date": today(), "description": "DP seragam" },
                { "production_id": batch + 1000, "kind": "pengeluaran", "amount": "250000",
                  "entry_date": today(), "description": "Kain drill" }
            ])),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (count,): (i64,) = query_as(r#"SELECT COUNT(*) FROM public.finance_entries"#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
