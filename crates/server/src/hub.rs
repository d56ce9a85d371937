//! Authoritative game registry.
//!
//! Every mutation of a game (join, move, resign) runs under that game's own
//! lock, so two racing requests are serialized and the first legal one wins.
//! Accepted changes are written through to Postgres (when configured) before
//! they become visible, then fanned out on the game's broadcast channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use chess_core::protocol::{ClientMessage, ServerMessage};
use chess_core::{fen, ChessError, Color, Game, GameStatus, UciMove};

use crate::db;
use crate::error::AppError;

/// One hosted game plus the credentials of its two seats.
#[derive(Debug, Clone)]
pub struct GameEntry {
    pub id: Uuid,
    pub white_secret: Uuid,
    pub black_secret: Option<Uuid>,
    pub game: Game,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameEntry {
    /// New game; the creator holds the white seat.
    pub fn new(id: Uuid, game: Game) -> Self {
        let now = Utc::now();
        Self {
            id,
            white_secret: Uuid::new_v4(),
            black_secret: None,
            game,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seat(&self, secret: Uuid) -> Result<Color, AppError> {
        if secret == self.white_secret {
            Ok(Color::White)
        } else if Some(secret) == self.black_secret {
            Ok(Color::Black)
        } else {
            Err(AppError::Unauthorized)
        }
    }

    pub fn fen(&self) -> String {
        fen::serialize(self.game.position())
    }

    fn legal_moves(&self) -> Vec<UciMove> {
        self.game.legal_moves().into_iter().map(UciMove::from).collect()
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            id: self.id,
            fen: self.fen(),
            start_fen: fen::serialize(self.game.start_position()),
            moves: self.game.moves_uci(),
            san: self.game.moves_san(),
            ply: self.game.ply_count(),
            status: self.game.status(),
            result: self.game.result(),
            legal_moves: self.legal_moves(),
            has_black: self.black_secret.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn game_state(&self) -> ServerMessage {
        ServerMessage::GameState {
            id: self.id,
            fen: self.fen(),
            moves: self.game.moves_uci(),
            ply: self.game.ply_count(),
            status: self.game.status(),
            result: self.game.result(),
            legal_moves: self.legal_moves(),
            white_connected: true,
            black_connected: self.black_secret.is_some(),
        }
    }

    fn move_made(&self, mv: UciMove, san: String) -> ServerMessage {
        ServerMessage::MoveMade {
            mv,
            san,
            fen: self.fen(),
            moves: self.game.moves_uci(),
            ply: self.game.ply_count(),
            status: self.game.status(),
            result: self.game.result(),
            legal_moves: self.legal_moves(),
        }
    }

    fn game_over(&self) -> ServerMessage {
        ServerMessage::GameOver {
            status: self.game.status(),
            result: self.game.result(),
        }
    }
}

/// Public view of a game, as returned by the REST endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub id: Uuid,
    pub fen: String,
    pub start_fen: String,
    pub moves: Vec<String>,
    pub san: Vec<String>,
    pub ply: usize,
    pub status: GameStatus,
    pub result: Option<String>,
    pub legal_moves: Vec<UciMove>,
    pub has_black: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Game view plus the credential for the seat that was just handed out.
#[derive(Debug, Clone, Serialize)]
pub struct SeatGrant {
    #[serde(flatten)]
    pub game: GameSummary,
    pub secret: Uuid,
    pub color: Color,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Game {id} not found"))
}

fn ensure_active(game: &Game) -> Result<(), AppError> {
    match game.status() {
        GameStatus::Active => Ok(()),
        GameStatus::Waiting => Err(ChessError::NotStarted.into()),
        terminal => Err(ChessError::GameOver(terminal).into()),
    }
}

struct HubInner {
    games: DashMap<Uuid, Arc<Mutex<GameEntry>>>,
    channels: DashMap<Uuid, broadcast::Sender<ServerMessage>>,
    store: Option<PgPool>,
    channel_capacity: usize,
}

#[derive(Clone)]
pub struct GameHub {
    inner: Arc<HubInner>,
}

impl GameHub {
    pub fn new(store: Option<PgPool>, channel_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                games: DashMap::new(),
                channels: DashMap::new(),
                store,
                channel_capacity: channel_capacity.max(1),
            }),
        }
    }

    /// Hub without persistence; games live only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(None, 64)
    }

    pub async fn create_game(&self, start_fen: Option<&str>) -> Result<SeatGrant, AppError> {
        let game = match start_fen {
            Some(text) => Game::import(text)?,
            None => Game::new(),
        };
        let entry = GameEntry::new(Uuid::new_v4(), game);
        self.persist(&entry).await?;

        let grant = SeatGrant {
            game: entry.summary(),
            secret: entry.white_secret,
            color: Color::White,
        };
        tracing::info!(game_id = %entry.id, fen = %grant.game.fen, "Game created");
        self.inner.games.insert(entry.id, Arc::new(Mutex::new(entry)));
        Ok(grant)
    }

    pub async fn game(&self, id: Uuid) -> Result<GameSummary, AppError> {
        let slot = self.entry(id).await?;
        let entry = slot.lock().await;
        Ok(entry.summary())
    }

    /// Most recent games first.
    pub async fn list_games(&self, limit: usize) -> Result<Vec<GameSummary>, AppError> {
        if let Some(pool) = &self.inner.store {
            let entries = db::games::list_games(pool, limit as i64).await?;
            return Ok(entries.iter().map(GameEntry::summary).collect());
        }

        let slots: Vec<_> = self.inner.games.iter().map(|e| e.value().clone()).collect();
        let mut games = Vec::with_capacity(slots.len());
        for slot in slots {
            games.push(slot.lock().await.summary());
        }
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        games.truncate(limit);
        Ok(games)
    }

    /// Hand out the black seat and start the game.
    pub async fn join_game(&self, id: Uuid) -> Result<SeatGrant, AppError> {
        let slot = self.entry(id).await?;
        let mut entry = slot.lock().await;
        if entry.black_secret.is_some() {
            return Err(AppError::Conflict("Game already has two players".to_string()));
        }

        let mut next = entry.clone();
        let secret = Uuid::new_v4();
        next.black_secret = Some(secret);
        next.game.start();
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *entry = next;

        tracing::info!(game_id = %id, status = %entry.game.status(), "Second player joined");
        self.broadcast(
            id,
            ServerMessage::PlayerJoined {
                color: Color::Black,
                fen: entry.fen(),
                status: entry.game.status(),
                legal_moves: entry.legal_moves(),
            },
        );
        // An imported position can already be decided.
        if entry.game.status().is_terminal() {
            self.broadcast(id, entry.game_over());
        }

        Ok(SeatGrant {
            game: entry.summary(),
            secret,
            color: Color::Black,
        })
    }

    /// Validate and apply one move. `ply` is the ply count the sender saw;
    /// a mismatch means another move landed first.
    pub async fn make_move(
        &self,
        id: Uuid,
        mv: UciMove,
        secret: Uuid,
        ply: Option<usize>,
    ) -> Result<ServerMessage, AppError> {
        let slot = self.entry(id).await?;
        let mut entry = slot.lock().await;
        let color = entry.seat(secret)?;
        ensure_active(&entry.game)?;

        let current = entry.game.ply_count();
        if let Some(seen) = ply {
            if seen != current {
                return Err(AppError::Conflict(format!(
                    "Stale move {mv}: made at ply {seen}, game is at ply {current}"
                )));
            }
        }
        if entry.game.position().side_to_move != color {
            return Err(AppError::BadRequest("Not your turn".to_string()));
        }

        let mut next = entry.clone();
        let resolved = mv.to_move(next.game.position())?;
        let san = next.game.apply_move(resolved)?.san.clone();
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *entry = next;

        tracing::info!(game_id = %id, mv = %mv, san = %san, ply = current + 1, "Move accepted");
        let made = entry.move_made(mv, san);
        self.broadcast(id, made.clone());
        if entry.game.status().is_terminal() {
            tracing::info!(game_id = %id, status = %entry.game.status(), "Game finished");
            self.broadcast(id, entry.game_over());
            self.evict_if_idle(id);
        }
        Ok(made)
    }

    pub async fn resign(&self, id: Uuid, secret: Uuid) -> Result<ServerMessage, AppError> {
        let slot = self.entry(id).await?;
        let mut entry = slot.lock().await;
        let color = entry.seat(secret)?;

        let mut next = entry.clone();
        next.game.resign(color)?;
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *entry = next;

        tracing::info!(game_id = %id, color = %color, "Player resigned");
        let over = entry.game_over();
        self.broadcast(id, over.clone());
        self.evict_if_idle(id);
        Ok(over)
    }

    /// Full `game_state` snapshot.
    pub async fn snapshot(&self, id: Uuid) -> Result<ServerMessage, AppError> {
        let slot = self.entry(id).await?;
        let entry = slot.lock().await;
        Ok(entry.game_state())
    }

    pub async fn subscribe(&self, id: Uuid) -> Result<broadcast::Receiver<ServerMessage>, AppError> {
        self.entry(id).await?;
        Ok(self.sender(id).subscribe())
    }

    /// Run one client request. Accepted moves and resignations reach the
    /// sender through the game's broadcast channel, so only a state request
    /// yields a direct reply.
    pub async fn handle_client_message(
        &self,
        id: Uuid,
        msg: ClientMessage,
    ) -> Result<Option<ServerMessage>, AppError> {
        match msg {
            ClientMessage::MakeMove { mv, secret, ply } => {
                self.make_move(id, mv, secret, ply).await?;
                Ok(None)
            }
            ClientMessage::Resign { secret } => {
                self.resign(id, secret).await?;
                Ok(None)
            }
            ClientMessage::RequestState => Ok(Some(self.snapshot(id).await?)),
        }
    }

    /// A subscriber went away. Finished games nobody watches are dropped
    /// from memory.
    pub async fn release(&self, id: Uuid) {
        let Some(slot) = self.inner.games.get(&id).map(|e| e.value().clone()) else {
            return;
        };
        let finished = slot.lock().await.game.status().is_terminal();
        if finished {
            self.evict_if_idle(id);
        }
    }

    /// Only finished games qualify: a handle to an evicted entry can no
    /// longer change it, and the store brings it back on the next lookup.
    fn evict_if_idle(&self, id: Uuid) {
        if self.inner.store.is_none() {
            return;
        }
        self.inner
            .channels
            .remove_if(&id, |_, tx| tx.receiver_count() == 0);
        if self.inner.channels.contains_key(&id) {
            return;
        }
        if self.inner.games.remove(&id).is_some() {
            tracing::debug!(game_id = %id, "Evicted finished game");
        }
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<Mutex<GameEntry>>, AppError> {
        let cached = self.inner.games.get(&id).map(|e| e.value().clone());
        if let Some(slot) = cached {
            return Ok(slot);
        }

        let Some(pool) = &self.inner.store else {
            return Err(not_found(id));
        };
        let entry = db::games::get_game(pool, id).await?.ok_or_else(|| not_found(id))?;
        tracing::debug!(game_id = %id, ply = entry.game.ply_count(), "Rehydrated game from store");
        let slot = self
            .inner
            .games
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(entry)))
            .value()
            .clone();
        Ok(slot)
    }

    fn sender(&self, id: Uuid) -> broadcast::Sender<ServerMessage> {
        self.inner
            .channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(self.inner.channel_capacity).0)
            .value()
            .clone()
    }

    fn broadcast(&self, id: Uuid, msg: ServerMessage) {
        let tx = self.inner.channels.get(&id).map(|tx| tx.value().clone());
        if let Some(tx) = tx {
            // No subscribers is not an error.
            let _ = tx.send(msg);
        }
    }

    async fn persist(&self, entry: &GameEntry) -> Result<(), AppError> {
        match &self.inner.store {
            Some(pool) => db::games::save_game(pool, entry).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn started(hub: &GameHub) -> (Uuid, Uuid, Uuid) {
        let created = hub.create_game(None).await.unwrap();
        let joined = hub.join_game(created.game.id).await.unwrap();
        (created.game.id, created.secret, joined.secret)
    }

    fn uci(text: &str) -> UciMove {
        text.parse().unwrap()
    }

    /// Hub backed by a pool that never connects; only usable for games
    /// inserted directly.
    fn detached_store_hub() -> GameHub {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        GameHub::new(Some(pool), 4)
    }

    fn insert(hub: &GameHub, game: Game) -> Uuid {
        let entry = GameEntry::new(Uuid::new_v4(), game);
        let id = entry.id;
        hub.inner.games.insert(id, Arc::new(Mutex::new(entry)));
        id
    }

    #[tokio::test]
    async fn creator_is_white_and_game_waits() {
        let hub = GameHub::in_memory();
        let grant = hub.create_game(None).await.unwrap();
        assert_eq!(grant.color, Color::White);
        assert_eq!(grant.game.status, GameStatus::Waiting);
        assert!(grant.game.legal_moves.is_empty());
        assert!(!grant.game.has_black);
    }

    #[tokio::test]
    async fn join_starts_the_game_once() {
        let hub = GameHub::in_memory();
        let (id, _, _) = started(&hub).await;
        assert_eq!(hub.game(id).await.unwrap().status, GameStatus::Active);
        assert!(matches!(hub.join_game(id).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn move_before_join_is_rejected() {
        let hub = GameHub::in_memory();
        let grant = hub.create_game(None).await.unwrap();
        let err = hub
            .make_move(grant.game.id, uci("e2e4"), grant.secret, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn move_is_broadcast_to_subscribers() {
        let hub = GameHub::in_memory();
        let (id, white, _) = started(&hub).await;
        let mut rx = hub.subscribe(id).await.unwrap();

        hub.make_move(id, uci("e2e4"), white, Some(0)).await.unwrap();

        let ServerMessage::MoveMade { fen, san, ply, .. } = rx.recv().await.unwrap() else {
            panic!("expected move_made");
        };
        assert_eq!(fen, "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert_eq!(san, "e4");
        assert_eq!(ply, 1);
    }

    #[tokio::test]
    async fn wrong_seat_and_wrong_turn() {
        let hub = GameHub::in_memory();
        let (id, white, black) = started(&hub).await;

        let err = hub.make_move(id, uci("e7e5"), black, None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = hub.make_move(id, uci("e2e4"), Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = hub.make_move(id, uci("e2e5"), white, None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(hub.game(id).await.unwrap().ply, 0);
    }

    #[tokio::test]
    async fn stale_ply_conflicts() {
        let hub = GameHub::in_memory();
        let (id, white, black) = started(&hub).await;
        hub.make_move(id, uci("e2e4"), white, Some(0)).await.unwrap();

        let err = hub.make_move(id, uci("e7e5"), black, Some(0)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        hub.make_move(id, uci("e7e5"), black, Some(1)).await.unwrap();
    }

    #[tokio::test]
    async fn racing_moves_exactly_one_wins() {
        let hub = GameHub::in_memory();
        let (id, white, _) = started(&hub).await;

        let a = tokio::spawn({
            let hub = hub.clone();
            async move { hub.make_move(id, uci("e2e4"), white, Some(0)).await }
        });
        let b = tokio::spawn({
            let hub = hub.clone();
            async move { hub.make_move(id, uci("d2d4"), white, Some(0)).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(hub.game(id).await.unwrap().ply, 1);
    }

    #[tokio::test]
    async fn checkmate_ends_the_game() {
        let hub = GameHub::in_memory();
        let (id, white, black) = started(&hub).await;
        let mut rx = hub.subscribe(id).await.unwrap();

        for (mv, secret) in [("f2f3", white), ("e7e5", black), ("g2g4", white), ("d8h4", black)] {
            hub.make_move(id, uci(mv), secret, None).await.unwrap();
        }

        let mut last = None;
        while let Ok(msg) = rx.try_recv() {
            last = Some(msg);
        }
        assert_eq!(
            last,
            Some(ServerMessage::GameOver {
                status: GameStatus::Checkmate,
                result: Some("black".into()),
            })
        );

        let err = hub.make_move(id, uci("a2a3"), white, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn resignation_is_final() {
        let hub = GameHub::in_memory();
        let (id, white, black) = started(&hub).await;

        let over = hub.resign(id, black).await.unwrap();
        assert_eq!(
            over,
            ServerMessage::GameOver {
                status: GameStatus::Resigned,
                result: Some("white".into()),
            }
        );
        assert!(matches!(hub.resign(id, white).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn request_state_replies_directly() {
        let hub = GameHub::in_memory();
        let (id, white, _) = started(&hub).await;

        let reply = hub
            .handle_client_message(id, ClientMessage::MakeMove { mv: uci("g1f3"), secret: white, ply: None })
            .await
            .unwrap();
        assert!(reply.is_none());

        let Some(ServerMessage::GameState { ply, moves, black_connected, .. }) =
            hub.handle_client_message(id, ClientMessage::RequestState).await.unwrap()
        else {
            panic!("expected game_state");
        };
        assert_eq!(ply, 1);
        assert_eq!(moves, vec!["g1f3".to_string()]);
        assert!(black_connected);
    }

    #[tokio::test]
    async fn imported_start_position() {
        let hub = GameHub::in_memory();
        let grant = hub
            .create_game(Some("4k3/8/8/8/8/8/8/4K2R w K - 0 1"))
            .await
            .unwrap();
        assert_eq!(grant.game.start_fen, "4k3/8/8/8/8/8/8/4K2R w K - 0 1");

        assert!(matches!(hub.create_game(Some("not a position")).await, Err(AppError::BadRequest(_))));
        assert!(matches!(hub.game(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn finished_game_evicted_after_last_subscriber() {
        let hub = detached_store_hub();
        let over = Game::restore(fen::INITIAL_FEN, &[], GameStatus::Resigned, Some(Color::Black)).unwrap();
        let id = insert(&hub, over);

        let rx = hub.subscribe(id).await.unwrap();
        hub.release(id).await;
        assert!(hub.inner.games.contains_key(&id));

        drop(rx);
        hub.release(id).await;
        assert!(!hub.inner.games.contains_key(&id));
        assert!(!hub.inner.channels.contains_key(&id));
    }

    #[tokio::test]
    async fn running_games_stay_resident() {
        let hub = detached_store_hub();
        let mut game = Game::new();
        game.start();
        let id = insert(&hub, game);

        drop(hub.subscribe(id).await.unwrap());
        hub.release(id).await;
        assert!(hub.inner.games.contains_key(&id));
    }

    #[tokio::test]
    async fn in_memory_games_are_never_evicted() {
        let hub = GameHub::in_memory();
        let (id, white, _) = started(&hub).await;
        hub.resign(id, white).await.unwrap();
        hub.release(id).await;
        assert_eq!(hub.game(id).await.unwrap().status, GameStatus::Resigned);
    }
}
