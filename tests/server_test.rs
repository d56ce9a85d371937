//! REST surface of the game server, exercised against an in-process instance.

mod common;

use common::{get_json, post_json, TestServer};
use serde_json::json;

async fn started_game(server: &TestServer) -> (String, String, String) {
    let (status, created) = post_json(server, "/api/games", json!({})).await;
    assert_eq!(status, 200);
    let id = created["id"].as_str().unwrap().to_string();
    let white = created["secret"].as_str().unwrap().to_string();

    let (status, joined) = post_json(server, &format!("/api/games/{id}/join"), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(joined["color"], "black");
    assert_eq!(joined["status"], "active");
    let black = joined["secret"].as_str().unwrap().to_string();

    (id, white, black)
}

// ---- Lifecycle ----

#[tokio::test]
async fn test_health() {
    let server = TestServer::spawn().await;
    let (status, body) = get_json(&server, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_and_fetch_game() {
    let server = TestServer::spawn().await;
    let (status, created) = post_json(&server, "/api/games", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(created["color"], "white");
    assert_eq!(created["status"], "waiting");
    assert_eq!(created["fen"], chess_core::INITIAL_FEN);

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = get_json(&server, &format!("/api/games/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(fetched["id"], created["id"]);
    assert!(fetched.get("secret").is_none(), "secrets must not leak from GET");

    let (status, list) = get_json(&server, "/api/games").await;
    assert_eq!(status, 200);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_game_is_404() {
    let server = TestServer::spawn().await;
    let id = uuid::Uuid::new_v4();
    let (status, body) = get_json(&server, &format!("/api/games/{id}")).await;
    assert_eq!(status, 404);
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_import_rejects_bad_notation() {
    let server = TestServer::spawn().await;
    let (status, body) = post_json(&server, "/api/games", json!({ "fen": "8/8/8 w - - 0 1" })).await;
    assert_eq!(status, 400);
    assert!(body["detail"].is_string());

    let (status, body) = post_json(
        &server,
        "/api/games",
        json!({ "fen": "4k3/8/8/8/8/8/8/4K2R w K - 0 1" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["fen"], "4k3/8/8/8/8/8/8/4K2R w K - 0 1");
}

#[tokio::test]
async fn test_second_join_conflicts() {
    let server = TestServer::spawn().await;
    let (id, _, _) = started_game(&server).await;
    let (status, _) = post_json(&server, &format!("/api/games/{id}/join"), json!({})).await;
    assert_eq!(status, 409);
}

// ---- Moves ----

#[tokio::test]
async fn test_move_flow() {
    let server = TestServer::spawn().await;
    let (id, white, black) = started_game(&server).await;
    let path = format!("/api/games/{id}/moves");

    let (status, body) = post_json(&server, &path, json!({ "move": "e2e4", "secret": white })).await;
    assert_eq!(status, 200);
    assert_eq!(body["fen"], "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
    assert_eq!(body["san"], json!(["e4"]));
    assert_eq!(body["legal_moves"].as_array().unwrap().len(), 20);

    // White again: not their turn.
    let (status, body) = post_json(&server, &path, json!({ "move": "d2d4", "secret": white })).await;
    assert_eq!(status, 400);
    assert_eq!(body["detail"], "Not your turn");

    // Unknown secret.
    let stranger = uuid::Uuid::new_v4();
    let (status, _) = post_json(&server, &path, json!({ "move": "e7e5", "secret": stranger })).await;
    assert_eq!(status, 401);

    // Illegal and malformed moves leave the game untouched.
    let (status, _) = post_json(&server, &path, json!({ "move": "e7e4", "secret": black })).await;
    assert_eq!(status, 400);
    let (status, _) = post_json(&server, &path, json!({ "move": "zz", "secret": black })).await;
    assert_eq!(status, 400);

    let (_, game) = get_json(&server, &format!("/api/games/{id}")).await;
    assert_eq!(game["ply"], 1);
}

#[tokio::test]
async fn test_stale_ply_is_conflict() {
    let server = TestServer::spawn().await;
    let (id, white, black) = started_game(&server).await;
    let path = format!("/api/games/{id}/moves");

    post_json(&server, &path, json!({ "move": "e2e4", "secret": white, "ply": 0 })).await;
    let (status, _) = post_json(&server, &path, json!({ "move": "e7e5", "secret": black, "ply": 0 })).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_racing_moves_one_winner() {
    let server = TestServer::spawn().await;
    let (id, white, _) = started_game(&server).await;
    let path = format!("/api/games/{id}/moves");

    let (a, b) = tokio::join!(
        post_json(&server, &path, json!({ "move": "e2e4", "secret": white, "ply": 0 })),
        post_json(&server, &path, json!({ "move": "d2d4", "secret": white, "ply": 0 })),
    );
    let statuses = [a.0, b.0];
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1, "{statuses:?}");

    let (_, game) = get_json(&server, &format!("/api/games/{id}")).await;
    assert_eq!(game["ply"], 1);
}

#[tokio::test]
async fn test_fools_mate_and_resign_after_end() {
    let server = TestServer::spawn().await;
    let (id, white, black) = started_game(&server).await;
    let path = format!("/api/games/{id}/moves");

    for (mv, secret) in [("f2f3", &white), ("e7e5", &black), ("g2g4", &white), ("d8h4", &black)] {
        let (status, _) = post_json(&server, &path, json!({ "move": mv, "secret": secret })).await;
        assert_eq!(status, 200);
    }

    let (_, game) = get_json(&server, &format!("/api/games/{id}")).await;
    assert_eq!(game["status"], "checkmate");
    assert_eq!(game["result"], "black");

    let (status, _) = post_json(&server, &format!("/api/games/{id}/resign"), json!({ "secret": white })).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_resign() {
    let server = TestServer::spawn().await;
    let (id, white, _) = started_game(&server).await;

    let (status, body) = post_json(&server, &format!("/api/games/{id}/resign"), json!({ "secret": white })).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "resigned");
    assert_eq!(body["result"], "black");
}

// ---- Engine ----

#[tokio::test]
async fn test_engine_unconfigured() {
    let server = TestServer::spawn().await;
    let (status, body) = post_json(
        &server,
        "/api/engine/suggest",
        json!({ "fen": chess_core::INITIAL_FEN, "nodes": 1000 }),
    )
    .await;
    assert_eq!(status, 503);
    assert_eq!(body["detail"], "Engine not configured");

    let (status, _) = post_json(
        &server,
        "/api/engine/suggest",
        json!({ "fen": chess_core::INITIAL_FEN, "nodes": 0 }),
    )
    .await;
    assert_eq!(status, 400);
}
