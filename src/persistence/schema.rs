//! `SQLite` schema bootstrap logic.
//!
//! Table definitions use `CREATE TABLE IF NOT EXISTS` and are re-run on
//! every server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply the checkpoint table definition to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS checkpoint (
    session_id      TEXT PRIMARY KEY NOT NULL,
    stage           TEXT NOT NULL CHECK(stage IN ('plan_pending_review','finalized')),
    version         INTEGER NOT NULL,
    state           TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoint_stage ON checkpoint(stage);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
