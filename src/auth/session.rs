// src/auth/session.rs

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub login_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-process session table. Tokens are only ever stored as SHA-256 digests.
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionData>>,
}

fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours.max(1)),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a session and returns the raw token for the cookie.
    pub fn create(
        &self,
        user_id: i64,
        username: impl Into<String>,
        full_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Result<String, AppError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let data = SessionData {
            user_id,
            username: username.into(),
            full_name: full_name.into(),
            role: role.into(),
            login_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.lock()?;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(digest(&token), data);
        Ok(token)
    }

    /// Returns the session behind `token` if it exists and has not expired.
    pub fn validate(&self, token: &str) -> Result<SessionData, AppError> {
        let key = digest(token);
        let mut sessions = self.lock()?;
        match sessions.get(&key) {
            None => {
                return Err(AppError::Unauthorized("session is invalid, please log in".into()))
            }
            Some(s) if Utc::now() < s.expires_at => return Ok(s.clone()),
            Some(_) => {}
        }
        sessions.remove(&key);
        Err(AppError::Unauthorized("session expired, please log in again".into()))
    }

    pub fn destroy(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(&digest(token)).is_some())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionData>>, AppError> {
        self.sessions
            .lock()
            .map_err(|e| AppError::Internal(format!("session store poisoned: {e}")))
    }
}
