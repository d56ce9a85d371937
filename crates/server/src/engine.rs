//! Advisory move suggestions from an external UCI engine (Stockfish).
//!
//! The engine is a child process spoken to over stdin/stdout. One process is
//! shared by all requests and respawned lazily after it fails.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AppError;

const ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Wire notation; `None` when the side to move has no move.
    pub best_move: Option<String>,
    /// Centipawns from the side to move's point of view.
    pub cp: Option<i32>,
    /// Mate in N (negative when the side to move gets mated).
    pub mate: Option<i32>,
}

fn engine_err(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("{context}: {e}"))
}

struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl UciEngine {
    async fn spawn(path: &str) -> Result<Self, AppError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| engine_err("Failed to spawn engine", e))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AppError::Internal("Engine stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| AppError::Internal("Engine stdout unavailable".to_string()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;
        engine.send("setoption name Threads value 1").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;
        Ok(engine)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), AppError> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| engine_err("Failed to write to engine", e))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| engine_err("Failed to flush engine stdin", e))
    }

    async fn next_line(&mut self) -> Result<String, AppError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| engine_err("Failed to read from engine", e))?;
        if read == 0 {
            return Err(AppError::Internal("Engine exited".to_string()));
        }
        let line = line.trim().to_string();
        debug!(line = %line, "engine >");
        Ok(line)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), AppError> {
        while self.next_line().await? != expected {}
        Ok(())
    }

    async fn search(&mut self, fen: &str, nodes: u32) -> Result<Suggestion, AppError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go nodes {nodes}")).await?;

        let mut suggestion = Suggestion {
            best_move: None,
            cp: None,
            mate: None,
        };
        loop {
            let line = self.next_line().await?;
            if line.starts_with("info") && line.contains(" pv ") {
                // Later lines are deeper; keep only the last score.
                if let Some(cp) = score_field(&line, "cp") {
                    suggestion.cp = Some(cp);
                    suggestion.mate = None;
                }
                if let Some(mate) = score_field(&line, "mate") {
                    suggestion.mate = Some(mate);
                    suggestion.cp = None;
                }
            } else if let Some(rest) = line.strip_prefix("bestmove") {
                suggestion.best_move = rest
                    .split_whitespace()
                    .next()
                    .filter(|mv| *mv != "(none)" && *mv != "0000")
                    .map(str::to_string);
                return Ok(suggestion);
            }
        }
    }
}

/// Integer following `key` in an engine `info` line.
fn score_field(line: &str, key: &str) -> Option<i32> {
    let mut words = line.split_whitespace();
    words.by_ref().find(|w| *w == key)?;
    words.next()?.parse().ok()
}

/// Shared handle to the engine process.
#[derive(Clone)]
pub struct EngineAdvisor {
    path: String,
    default_nodes: u32,
    /// Bound on the startup handshake and on each search.
    timeout: Duration,
    engine: Arc<Mutex<Option<UciEngine>>>,
}

impl EngineAdvisor {
    pub fn new(path: impl Into<String>, default_nodes: u32) -> Self {
        Self {
            path: path.into(),
            default_nodes,
            timeout: ENGINE_TIMEOUT,
            engine: Arc::new(Mutex::new(None)),
        }
    }

    /// Best move for `fen`. Requests are served one at a time.
    pub async fn suggest(&self, fen: &str, nodes: Option<u32>) -> Result<Suggestion, AppError> {
        let nodes = nodes.unwrap_or(self.default_nodes);
        let mut slot = self.engine.lock().await;
        if slot.is_none() {
            tracing::info!(path = %self.path, "Starting engine");
            let started = tokio::time::timeout(self.timeout, UciEngine::spawn(&self.path))
                .await
                .map_err(|_| AppError::Internal("Engine handshake timed out".to_string()))??;
            *slot = Some(started);
        }
        let Some(engine) = slot.as_mut() else {
            return Err(AppError::Internal("Engine unavailable".to_string()));
        };

        let outcome = match tokio::time::timeout(self.timeout, engine.search(fen, nodes)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Internal("Engine search timed out".to_string())),
        };
        if outcome.is_err() {
            // Output of a broken or stalled search cannot be trusted; respawn next time.
            tracing::warn!("Discarding engine process after failed search");
            *slot = None;
        }
        outcome
    }

    pub async fn shutdown(&self) {
        if let Some(mut engine) = self.engine.lock().await.take() {
            let _ = engine.send("quit").await;
            let _ = engine.process.wait().await;
        }
    }
}
