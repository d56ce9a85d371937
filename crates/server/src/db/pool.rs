use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Create the games table if it is missing.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Hosted games. The move list is the source of truth; fen is kept for listing.
CREATE TABLE IF NOT EXISTS games (
    id           UUID PRIMARY KEY,
    white_secret UUID NOT NULL,
    black_secret UUID,
    start_fen    TEXT NOT NULL,
    fen          TEXT NOT NULL,
    moves        TEXT[] NOT NULL DEFAULT '{}',
    status       TEXT NOT NULL,
    result       TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_games_created_at
    ON games (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_games_status
    ON games (status);
"#;
