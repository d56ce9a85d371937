pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod hub;
pub mod routes;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::EngineAdvisor;
use crate::hub::GameHub;

/// Full HTTP + WebSocket surface over a game hub.
pub fn router(hub: GameHub, advisor: Option<EngineAdvisor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        // Games
        .route(
            "/api/games",
            post(routes::games::create_game).get(routes::games::list_games),
        )
        .route("/api/games/{game_id}", get(routes::games::get_game))
        .route("/api/games/{game_id}/join", post(routes::games::join_game))
        .route("/api/games/{game_id}/moves", post(routes::games::make_move))
        .route("/api/games/{game_id}/resign", post(routes::games::resign))
        .route("/ws/games/{game_id}", get(routes::ws::ws_handler))
        // Engine
        .route("/api/engine/suggest", post(routes::engine::suggest_move))
        .layer(Extension(hub))
        .layer(Extension(advisor))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
