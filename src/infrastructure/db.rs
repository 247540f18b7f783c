//! SQLx Postgres 连接池初始化、健康检查与 schema 迁移
//!
//! 用法：
//! let pool = init_pool(&config.database).await?;
//! run_migrations(&pool).await?;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::DatabaseConfig;

pub type PgPool = sqlx::Pool<sqlx::Postgres>;

/// 初始化连接池并验证连接
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let url = config
        .url
        .as_deref()
        .context("DATABASE_URL is not configured")?;

    let max_conns = config.max_connections.clamp(1, 200);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_conns)
        .min_connections(config.min_connections.min(max_conns))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(300))
        .test_before_acquire(true)
        .connect(url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            e
        })
        .context("Failed to connect to database")?;

    health_check(&pool).await?;

    Ok(pool)
}

/// 数据库健康检查
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// 执行 migrations/ 下的 schema 迁移
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("✅ Database migrations applied");
    Ok(())
}
