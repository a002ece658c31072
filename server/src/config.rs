//! Command line and environment configuration for the server binary.

use crate::gateway::RoomLimits;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Multiplayer drawing and guessing game server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "SKETCH_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, env = "SKETCH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum number of connected players
    #[arg(short, long, env = "SKETCH_MAX_CLIENTS", default_value_t = 64)]
    pub max_clients: usize,

    /// Upper bound on rounds a host may choose
    #[arg(long, env = "SKETCH_MAX_ROUNDS", default_value_t = 10)]
    pub max_rounds: u32,

    /// Shortest drawing time a host may choose, in seconds
    #[arg(long, env = "SKETCH_MIN_DRAWING_SECS", default_value_t = 30)]
    pub min_drawing_secs: u32,

    /// Longest drawing time a host may choose, in seconds
    #[arg(long, env = "SKETCH_MAX_DRAWING_SECS", default_value_t = 240)]
    pub max_drawing_secs: u32,

    /// Seconds of silence before a client is dropped
    #[arg(long, env = "SKETCH_CLIENT_TIMEOUT_SECS", default_value_t = 30)]
    pub client_timeout_secs: u64,

    /// Word list with one `category:word` entry per line
    #[arg(short, long, env = "SKETCH_WORD_LIST")]
    pub word_list: Option<PathBuf>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs.max(1))
    }

    pub fn room_limits(&self) -> RoomLimits {
        RoomLimits {
            max_rounds: self.max_rounds.max(1),
            min_drawing_secs: self.min_drawing_secs,
            max_drawing_secs: self.max_drawing_secs.max(self.min_drawing_secs),
        }
    }
}
