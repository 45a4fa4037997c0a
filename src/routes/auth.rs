// src/routes/auth.rs

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use sqlx::query_as;
use tracing::{info, warn};

use super::required;
use crate::auth::{
    guard::{clear_cookie, session_cookie},
    session_token, verify_password, SessionData,
};
use crate::error::{ApiJson, AppError, AppResult};
use crate::{models::User, AppState};

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<LoginBody>,
) -> AppResult<impl IntoResponse> {
    let username = required("username", &b.username)?;
    if b.password.is_empty() {
        return Err(AppError::validation("password is required"));
    }

    let user = query_as::<_, User>(
        r#"SELECT user_id, username, full_name, password_hash, role, is_active, created_at
           FROM public.users WHERE username = $1 AND is_active"#,
    )
    .bind(&username)
    .fetch_optional(&state.pool)
    .await?;

    let rejected = || AppError::Unauthorized("invalid username or password".into());
    let Some(user) = user else {
        warn!(%username, "login for unknown user");
        return Err(rejected());
    };
    if !verify_password(b.password, user.password_hash.clone()).await? {
        warn!(%username, "login with wrong password");
        return Err(rejected());
    }

    let token = state
        .sessions
        .create(user.user_id, &user.username, &user.full_name, &user.role)?;
    let session = state.sessions.validate(&token)?;
    info!(user_id = user.user_id, %username, "logged in");

    let cookie = session_cookie(&token, state.sessions.ttl().num_seconds(), state.cookie_secure);
    Ok(([(header::SET_COOKIE, cookie)], Json(session)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionData>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        state.sessions.destroy(&token)?;
    }
    info!(user_id = session.user_id, "logged out");
    Ok((
        [(header::SET_COOKIE, clear_cookie(state.cookie_secure))],
        Json(serde_json::json!({ "logged_out": true })),
    ))
}

pub async fn me(Extension(session): Extension<SessionData>) -> Json<SessionData> {
    Json(session)
}
