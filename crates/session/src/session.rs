//! Optimistic move synchronizer.
//!
//! A local move is applied to a scratch copy of the confirmed position with
//! the same rules code the server runs, shown right away, and sent. The copy
//! is dropped exactly once: when the server confirms the move, rejects it,
//! replaces the state, or the connection goes away. Whatever the server says
//! is adopted verbatim.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chess_core::protocol::{ClientMessage, ServerMessage};
use chess_core::{apply_move, fen, san, ChessError, Color, GameStatus, PieceKind, Position, Square, UciMove};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    PendingConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// What the session reports to its owner, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Full snapshot adopted (initial state or resync).
    StateSynced {
        fen: String,
        ply: usize,
        status: GameStatus,
    },
    MoveConfirmed {
        mv: UciMove,
        san: String,
        fen: String,
    },
    /// The pending move was dropped; the display is back on the confirmed position.
    MoveRejected {
        mv: UciMove,
        reason: String,
    },
    /// A move this session did not have pending.
    MoveApplied {
        mv: UciMove,
        san: String,
        fen: String,
        by: Color,
    },
    PlayerJoined {
        color: Color,
    },
    GameOver {
        status: GameStatus,
        result: Option<String>,
    },
    /// Server error with no move pending.
    ServerError {
        message: String,
    },
    ConnectionLost,
}

/// Input from whatever carries the protocol.
#[derive(Debug)]
pub enum TransportEvent {
    Message(ServerMessage),
    Disconnected,
    /// New link; carries its outbound side.
    Reconnected(mpsc::UnboundedSender<ClientMessage>),
}

#[derive(Debug, Clone)]
struct Pending {
    mv: UciMove,
    /// Ply count of the confirmed state the move was made against.
    ply: usize,
    san: String,
    position: Position,
}

pub struct Session {
    color: Color,
    secret: Uuid,
    confirmed: Position,
    moves: Vec<String>,
    status: GameStatus,
    result: Option<String>,
    legal_moves: Vec<UciMove>,
    pending: Option<Pending>,
    connection: ConnectionStatus,
    needs_resync: bool,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Session {
    /// Session for the seat `color`, authenticated by `secret`. Moves are
    /// refused until the first `game_state` arrives.
    pub fn new(
        color: Color,
        secret: Uuid,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            color,
            secret,
            confirmed: Position::initial(),
            moves: Vec::new(),
            status: GameStatus::Waiting,
            result: None,
            legal_moves: Vec::new(),
            pending: None,
            connection: ConnectionStatus::Connected,
            needs_resync: true,
            outbound,
            events,
        };
        (session, events_rx)
    }

    pub fn sync_state(&self) -> SyncState {
        if self.pending.is_some() {
            SyncState::PendingConfirmation
        } else {
            SyncState::Synced
        }
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn awaiting_resync(&self) -> bool {
        self.needs_resync
    }

    /// Last position the server confirmed.
    pub fn confirmed_position(&self) -> &Position {
        &self.confirmed
    }

    /// Position to draw: the speculative one while a move is pending.
    pub fn display_position(&self) -> &Position {
        self.pending.as_ref().map(|p| &p.position).unwrap_or(&self.confirmed)
    }

    pub fn pending_move(&self) -> Option<UciMove> {
        self.pending.as_ref().map(|p| p.mv)
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Legal moves of the confirmed position, as last reported by the server.
    pub fn legal_moves(&self) -> &[UciMove] {
        &self.legal_moves
    }

    pub fn is_my_turn(&self) -> bool {
        self.status == GameStatus::Active && self.confirmed.side_to_move == self.color
    }

    /// Apply a local move speculatively and send it. Returns the position to
    /// display until the server answers.
    pub fn attempt_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<&Position, SessionError> {
        if self.connection == ConnectionStatus::Disconnected {
            return Err(SessionError::Disconnected);
        }
        if self.pending.is_some() {
            return Err(SessionError::MovePending);
        }
        if self.needs_resync {
            return Err(SessionError::AwaitingResync);
        }
        match self.status {
            GameStatus::Active => {}
            GameStatus::Waiting => return Err(ChessError::NotStarted.into()),
            terminal => return Err(ChessError::GameOver(terminal).into()),
        }
        if !self.is_my_turn() {
            return Err(SessionError::NotYourTurn);
        }

        let wire = UciMove::new(from, to, promotion);
        let mv = wire.to_move(&self.confirmed)?;
        let position = apply_move(&self.confirmed, mv)?;
        let san = san::to_san(&self.confirmed, mv);

        let ply = self.ply();
        self.outbound
            .send(ClientMessage::MakeMove {
                mv: wire,
                secret: self.secret,
                ply: Some(ply),
            })
            .map_err(|_| SessionError::Transport("outbound channel closed".to_string()))?;
        debug!(mv = %wire, ply, "Move sent, awaiting confirmation");

        let pending = self.pending.insert(Pending { mv: wire, ply, san, position });
        Ok(&pending.position)
    }

    /// Refused while a move is pending: a server `error` carries no request
    /// id, so it is always read as the answer to the pending move.
    pub fn resign(&mut self) -> Result<(), SessionError> {
        if self.connection == ConnectionStatus::Disconnected {
            return Err(SessionError::Disconnected);
        }
        if self.pending.is_some() {
            return Err(SessionError::MovePending);
        }
        if self.status.is_terminal() {
            return Err(ChessError::GameOver(self.status).into());
        }
        self.outbound
            .send(ClientMessage::Resign { secret: self.secret })
            .map_err(|_| SessionError::Transport("outbound channel closed".to_string()))
    }

    /// Reconcile with one server message. An `error` reply is returned as
    /// `Err(Rejected)` after any pending move has been rolled back.
    pub fn handle_server_message(&mut self, msg: ServerMessage) -> Result<(), SessionError> {
        match msg {
            ServerMessage::GameState {
                fen,
                moves,
                ply,
                status,
                result,
                legal_moves,
                ..
            } => {
                self.confirmed = fen::parse(&fen)?;
                self.moves = moves;
                self.status = status;
                self.result = result;
                self.legal_moves = legal_moves;
                self.needs_resync = false;

                if let Some(pending) = self.pending.take() {
                    // The snapshot may already include our move.
                    if self.moves.get(pending.ply) == Some(&pending.mv.to_string()) {
                        self.emit(SessionEvent::MoveConfirmed {
                            mv: pending.mv,
                            san: pending.san,
                            fen: fen.clone(),
                        });
                    } else {
                        self.emit(SessionEvent::MoveRejected {
                            mv: pending.mv,
                            reason: "superseded by server state".to_string(),
                        });
                    }
                }
                info!(ply, status = %status, "Adopted server state");
                self.emit(SessionEvent::StateSynced { fen, ply, status });
                Ok(())
            }

            ServerMessage::MoveMade {
                mv,
                san,
                fen,
                moves,
                status,
                result,
                legal_moves,
                ..
            } => {
                self.confirmed = fen::parse(&fen)?;
                self.moves = moves;
                self.status = status;
                self.result = result;
                self.legal_moves = legal_moves;

                match self.pending.take() {
                    Some(pending) if pending.mv == mv && pending.ply + 1 == self.moves.len() => {
                        debug!(mv = %mv, "Move confirmed");
                        self.emit(SessionEvent::MoveConfirmed { mv, san, fen });
                    }
                    other => {
                        if let Some(pending) = other {
                            warn!(pending = %pending.mv, server = %mv, "Pending move superseded");
                            self.emit(SessionEvent::MoveRejected {
                                mv: pending.mv,
                                reason: format!("superseded by {mv}"),
                            });
                        }
                        let by = self.confirmed.side_to_move.opponent();
                        self.emit(SessionEvent::MoveApplied { mv, san, fen, by });
                    }
                }
                Ok(())
            }

            ServerMessage::PlayerJoined {
                color,
                fen,
                status,
                legal_moves,
            } => {
                self.confirmed = fen::parse(&fen)?;
                self.status = status;
                self.legal_moves = legal_moves;
                self.emit(SessionEvent::PlayerJoined { color });
                Ok(())
            }

            ServerMessage::GameOver { status, result } => {
                self.status = status;
                self.result = result.clone();
                self.legal_moves.clear();
                if let Some(pending) = self.pending.take() {
                    self.emit(SessionEvent::MoveRejected {
                        mv: pending.mv,
                        reason: format!("game over ({status})"),
                    });
                }
                info!(status = %status, ?result, "Game over");
                self.emit(SessionEvent::GameOver { status, result });
                Ok(())
            }

            ServerMessage::Error { message } => {
                match self.pending.take() {
                    Some(pending) => {
                        warn!(mv = %pending.mv, "Move rejected: {message}");
                        self.emit(SessionEvent::MoveRejected {
                            mv: pending.mv,
                            reason: message.clone(),
                        });
                    }
                    None => {
                        warn!("Server error: {message}");
                        self.emit(SessionEvent::ServerError { message: message.clone() });
                    }
                }
                Err(SessionError::Rejected(message))
            }
        }
    }

    /// Transport lost: any pending move is abandoned and moves are blocked
    /// until a reconnect brings a fresh snapshot.
    pub fn on_disconnect(&mut self) {
        self.connection = ConnectionStatus::Disconnected;
        self.needs_resync = true;
        if let Some(pending) = self.pending.take() {
            self.emit(SessionEvent::MoveRejected {
                mv: pending.mv,
                reason: "connection lost".to_string(),
            });
        }
        warn!("Connection lost");
        self.emit(SessionEvent::ConnectionLost);
    }

    /// New link established; ask for the full state rather than trusting
    /// local history.
    pub fn on_reconnect(
        &mut self,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> Result<(), SessionError> {
        self.outbound = outbound;
        self.connection = ConnectionStatus::Connected;
        self.needs_resync = true;
        info!("Reconnected, requesting state");
        self.outbound
            .send(ClientMessage::RequestState)
            .map_err(|_| SessionError::Transport("outbound channel closed".to_string()))
    }

    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.events.send(event);
    }
}

/// Feed transport events into a shared session until the transport closes.
pub async fn drive(session: Arc<Mutex<Session>>, mut inbound: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = inbound.recv().await {
        let mut session = session.lock().await;
        let outcome = match event {
            TransportEvent::Message(msg) => session.handle_server_message(msg),
            TransportEvent::Disconnected => {
                session.on_disconnect();
                Ok(())
            }
            TransportEvent::Reconnected(outbound) => session.on_reconnect(outbound),
        };
        if let Err(e) = outcome {
            debug!("Session event handled with error: {e}");
        }
    }
    debug!("Transport closed");
}
