// src/main.rs

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use konveksi_api::{auth::SessionStore, config::AppConfig, db, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;
    if let Some(seed) = &config.admin_seed {
        db::ensure_admin(&pool, seed).await?;
    }

    let state = AppState::new(
        pool,
        SessionStore::new(config.session_ttl_hours),
        config.cookie_secure,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "API listening");

    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
