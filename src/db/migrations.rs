//! Opening the desk database and applying its schema.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const SCHEMA: &str = include_str!("schema.sql");

/// Open (creating if needed) the SQLite database at `db_path` and apply the schema.
///
/// Connections enforce foreign keys and use WAL with a five second busy timeout.
///
/// # Errors
/// Returns `sqlx::Error::Io` if the parent directory cannot be created, or any
/// connection or schema error.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    apply_schema(&pool).await?;
    info!("Desk database ready at {}", db_path);
    Ok(pool)
}

/// Apply every schema statement in one transaction. Statements are idempotent.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut applied = 0;
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(&mut *tx).await?;
        applied += 1;
    }
    tx.commit().await?;
    info!("Applied {} schema statements", applied);
    Ok(())
}
