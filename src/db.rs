use sqlx::SqlitePool;

use crate::error::AppResult;

/// Connect and make sure the schema exists. All tables are created
/// idempotently so a fresh database file works out of the box.
pub async fn connect(url: &str) -> AppResult<SqlitePool> {
    let pool = SqlitePool::connect(url).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id         TEXT PRIMARY KEY,
            username   TEXT NOT NULL UNIQUE,
            password   TEXT NOT NULL,
            is_admin   INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS invites (
            code       TEXT PRIMARY KEY,
            created_by TEXT NOT NULL,
            used_by    TEXT,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS room_state (
            room_id       TEXT PRIMARY KEY,
            video_path    TEXT,
            position      REAL NOT NULL DEFAULT 0,
            paused        INTEGER NOT NULL DEFAULT 1,
            playback_rate REAL NOT NULL DEFAULT 1,
            updated_at    INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-connection in-memory pool for tests. SQLite `:memory:` databases
/// are per-connection, so the pool must not open a second one.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
