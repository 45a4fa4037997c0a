// src/auth/mod.rs

pub mod guard;
pub mod session;

pub use guard::{require_session, session_token, SESSION_COOKIE};
pub use session::{SessionData, SessionStore};

use crate::error::AppError;

/// Hashing blocks for a noticeable time; it runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await?
        .map_err(|e| AppError::Internal(format!("password verification failed: {e}")))
}
