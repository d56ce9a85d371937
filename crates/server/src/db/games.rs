use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use chess_core::{fen, Color, Game, GameStatus};

use crate::error::AppError;
use crate::hub::GameEntry;

#[derive(sqlx::FromRow)]
pub struct GameRow {
    pub id: Uuid,
    pub white_secret: Uuid,
    pub black_secret: Option<Uuid>,
    pub start_fen: String,
    pub moves: Vec<String>,
    pub status: String,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRow {
    /// Rebuild the in-memory record by replaying the stored moves.
    pub fn into_entry(self) -> Result<GameEntry, AppError> {
        let status: GameStatus = self
            .status
            .parse()
            .map_err(|e| AppError::Internal(format!("Stored game {}: {e}", self.id)))?;
        let winner = match self.result.as_deref() {
            Some("white") => Some(Color::White),
            Some("black") => Some(Color::Black),
            _ => None,
        };
        let game = Game::restore(&self.start_fen, &self.moves, status, winner).map_err(|e| {
            AppError::Internal(format!("Stored game {} does not replay: {e}", self.id))
        })?;

        Ok(GameEntry {
            id: self.id,
            white_secret: self.white_secret,
            black_secret: self.black_secret,
            game,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Insert or overwrite a game.
pub async fn save_game(pool: &PgPool, entry: &GameEntry) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO games (
            id, white_secret, black_secret, start_fen, fen, moves, status, result,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            black_secret = EXCLUDED.black_secret,
            start_fen = EXCLUDED.start_fen,
            fen = EXCLUDED.fen,
            moves = EXCLUDED.moves,
            status = EXCLUDED.status,
            result = EXCLUDED.result,
            updated_at = EXCLUDED.updated_at"#,
    )
    .bind(entry.id)
    .bind(entry.white_secret)
    .bind(entry.black_secret)
    .bind(fen::serialize(entry.game.start_position()))
    .bind(entry.fen())
    .bind(entry.game.moves_uci())
    .bind(entry.game.status().as_str())
    .bind(entry.game.result())
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(())
}

pub async fn get_game(pool: &PgPool, id: Uuid) -> Result<Option<GameEntry>, AppError> {
    let row: Option<GameRow> = sqlx::query_as(
        r#"SELECT id, white_secret, black_secret, start_fen, moves, status, result,
                  created_at, updated_at
           FROM games WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)?;

    row.map(GameRow::into_entry).transpose()
}

/// Newest first.
pub async fn list_games(pool: &PgPool, limit: i64) -> Result<Vec<GameEntry>, AppError> {
    let rows: Vec<GameRow> = sqlx::query_as(
        r#"SELECT id, white_secret, black_secret, start_fen, moves, status, result,
                  created_at, updated_at
           FROM games
           ORDER BY created_at DESC
           LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(AppError::Sqlx)?;

    rows.into_iter().map(GameRow::into_entry).collect()
}
