//! SQLite access for the component stores
//!
//! One table per package type. Each row is one whole component; rows are
//! keyed by `(language, voice, component)` and indexed by `(language, voice)`.

use crate::types::PackageKind;
use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Initialize database connection pool
///
/// Creates the parent directory and the component tables if needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the component tables and their `(language, voice)` indexes
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    for kind in [PackageKind::Model, PackageKind::Audio] {
        let table = kind.table();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                path TEXT NOT NULL,
                language TEXT NOT NULL,
                voice TEXT NOT NULL,
                component TEXT NOT NULL,
                version TEXT NOT NULL,
                bytes BLOB NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (language, voice, component)
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_language_voice ON {table} (language, voice)"
        ))
        .execute(pool)
        .await?;
    }

    tracing::info!("Database tables initialized (model_components, audio_components)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        init_tables(&pool).await.unwrap();
        init_tables(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["audio_components", "model_components"]);
    }
}
