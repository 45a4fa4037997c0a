//! Production tracking and payroll API for a garment workshop.
//!
//! Employees are assigned slices of production batches, report daily
//! progress, and earn piece-rate or daily-rate wages; finance entries and
//! reports sit on top of the same Postgres store.

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod payroll;
pub mod routes;

pub use routes::router;

use auth::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub sessions: Arc<SessionStore>,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, sessions: SessionStore, cookie_secure: bool) -> Self {
        Self { pool, sessions: Arc::new(sessions), cookie_secure }
    }
}
