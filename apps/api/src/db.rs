use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::resume::ResumeRow;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn fetch_resume(pool: &PgPool, resume_id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
        .bind(resume_id)
        .fetch_optional(pool)
        .await
}

/// Writes the live LaTeX source and returns the row's new `updated_at`,
/// or `None` when the resume no longer exists.
pub async fn update_latex_source(
    pool: &PgPool,
    resume_id: Uuid,
    latex: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        "UPDATE resumes SET latex_source = $1, updated_at = NOW() WHERE id = $2 RETURNING updated_at",
    )
    .bind(latex)
    .bind(resume_id)
    .fetch_optional(pool)
    .await
}
