use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres persistence is enabled only when set.
    pub database_url: Option<String>,
    /// Path to a UCI engine binary for move suggestions.
    pub stockfish_path: Option<String>,
    pub engine_nodes: u32,
    /// Buffered server messages per game before slow sockets start lagging.
    pub channel_capacity: usize,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            stockfish_path: None,
            engine_nodes: 100_000,
            channel_capacity: 64,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            stockfish_path: env::var("STOCKFISH_PATH").ok().filter(|v| !v.is_empty()),
            engine_nodes: env::var("ENGINE_NODES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.engine_nodes),
            channel_capacity: env::var("CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.channel_capacity),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}
