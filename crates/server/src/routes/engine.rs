use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use chess_core::{fen, san, Position, UciMove};

use crate::engine::EngineAdvisor;
use crate::error::AppError;

#[derive(Deserialize, Validate)]
pub struct SuggestRequest {
    #[validate(length(min = 15, max = 100))]
    pub fen: String,
    #[validate(range(min = 1, max = 10_000_000))]
    pub nodes: Option<u32>,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub fen: String,
    pub best_move: Option<String>,
    pub san: Option<String>,
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

/// POST /api/engine/suggest
///
/// The engine is advisory only: its answer is checked against our own legal
/// move set before it is passed on.
pub async fn suggest_move(
    Extension(advisor): Extension<Option<EngineAdvisor>>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let position: Position = req.fen.parse()?;
    let advisor = advisor.ok_or_else(|| AppError::Unavailable("Engine not configured".to_string()))?;

    let fen = fen::serialize(&position);
    let suggestion = advisor.suggest(&fen, req.nodes).await?;

    let san = match &suggestion.best_move {
        Some(text) => {
            let mv = text
                .parse::<UciMove>()
                .and_then(|m| m.to_move(&position))
                .map_err(|e| AppError::Internal(format!("Engine suggested an unusable move: {e}")))?;
            Some(san::to_san(&position, mv))
        }
        None => None,
    };
    tracing::debug!(fen = %fen, best_move = ?suggestion.best_move, "Engine suggestion");

    Ok(Json(SuggestResponse {
        fen,
        best_move: suggestion.best_move,
        san,
        cp: suggestion.cp,
        mate: suggestion.mate,
    }))
}
