// src/db/mod.rs

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::auth::hash_password;
use crate::config::{AdminSeed, AppConfig};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await?;

    info!(max_connections = config.max_connections, "connected to PostgreSQL");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("migrations applied");
    Ok(())
}

/// Creates the first administrator when the users table is still empty.
pub async fn ensure_admin(pool: &PgPool, seed: &AdminSeed) -> anyhow::Result<bool> {
    let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM public.users"#)
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(false);
    }

    let hash = hash_password(seed.password.clone()).await?;
    sqlx::query(
        r#"INSERT INTO public.users (username, full_name, password_hash, role)
           VALUES ($1, $1, $2, 'admin')"#,
    )
    .bind(&seed.username)
    .bind(hash)
    .execute(pool)
    .await?;

    info!(username = %seed.username, "seeded initial administrator");
    Ok(true)
}
