use axum::{extract::Path, extract::Query, Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use chess_core::UciMove;

use crate::error::AppError;
use crate::hub::{GameHub, GameSummary, SeatGrant};

#[derive(Deserialize)]
pub struct CreateGameRequest {
    /// Start from this position instead of the standard one.
    pub fen: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct MakeMoveRequest {
    #[serde(rename = "move")]
    pub mv: String,
    pub secret: Uuid,
    pub ply: Option<usize>,
}

#[derive(Deserialize)]
pub struct ResignRequest {
    pub secret: Uuid,
}

/// POST /api/games
pub async fn create_game(
    Extension(hub): Extension<GameHub>,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<SeatGrant>, AppError> {
    let grant = hub.create_game(req.fen.as_deref()).await?;
    Ok(Json(grant))
}

/// GET /api/games
pub async fn list_games(
    Extension(hub): Extension<GameHub>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(hub.list_games(limit).await?))
}

/// GET /api/games/{game_id}
pub async fn get_game(
    Extension(hub): Extension<GameHub>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(hub.game(game_id).await?))
}

/// POST /api/games/{game_id}/join
pub async fn join_game(
    Extension(hub): Extension<GameHub>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<SeatGrant>, AppError> {
    Ok(Json(hub.join_game(game_id).await?))
}

/// POST /api/games/{game_id}/moves
pub async fn make_move(
    Extension(hub): Extension<GameHub>,
    Path(game_id): Path<Uuid>,
    Json(req): Json<MakeMoveRequest>,
) -> Result<Json<GameSummary>, AppError> {
    let mv: UciMove = req.mv.parse()?;
    hub.make_move(game_id, mv, req.secret, req.ply).await?;
    Ok(Json(hub.game(game_id).await?))
}

/// POST /api/games/{game_id}/resign
pub async fn resign(
    Extension(hub): Extension<GameHub>,
    Path(game_id): Path<Uuid>,
    Json(req): Json<ResignRequest>,
) -> Result<Json<GameSummary>, AppError> {
    hub.resign(game_id, req.secret).await?;
    Ok(Json(hub.game(game_id).await?))
}
