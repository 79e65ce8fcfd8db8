//! Server configuration: command-line flags layered over an optional JSON
//! file of game tunables.

use clap::Parser;
use log::info;
use shared::GameConfig;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Authoritative snake arena server")]
pub struct Args {
    /// Interface to bind the WebSocket listener on
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    #[clap(short, long, default_value = "8080")]
    pub port: u16,

    /// Simulation tick interval in milliseconds
    #[clap(long)]
    pub tick_ms: Option<u64>,

    #[clap(long)]
    pub world_width: Option<f32>,

    #[clap(long)]
    pub world_height: Option<f32>,

    #[clap(long)]
    pub max_food: Option<usize>,

    #[clap(long, default_value = "100")]
    pub max_clients: usize,

    /// Seed for food placement and spawn points. Random if omitted.
    #[clap(long)]
    pub seed: Option<u64>,

    /// JSON file with game tunables. Flags above take precedence.
    #[clap(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "cannot read {}: {}", path.display(), e),
            ConfigError::Parse(path, e) => write!(f, "invalid config {}: {}", path.display(), e),
            ConfigError::Invalid(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(_, e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    /// Capacity of each connection's outbound queue
    pub outbound_queue: usize,
    pub ping_interval_secs: u64,
    /// Silence after which a session is reported as stale. Advisory only.
    pub stale_after_secs: u64,
    pub seed: Option<u64>,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_clients: 100,
            outbound_queue: 64,
            ping_interval_secs: 5,
            stale_after_secs: 30,
            seed: None,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be at least 1".to_string()));
        }
        if self.outbound_queue == 0 {
            return Err(ConfigError::Invalid("outbound_queue must be at least 1".to_string()));
        }
        self.game.validate().map_err(ConfigError::Invalid)
    }
}

pub fn load_game_config(path: &Path) -> Result<GameConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

impl Args {
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut game = match &self.config {
            Some(path) => {
                info!("Loading game config from {}", path.display());
                load_game_config(path)?
            }
            None => GameConfig::default(),
        };

        if let Some(tick_ms) = self.tick_ms {
            game.tick_interval_ms = tick_ms;
        }
        if let Some(width) = self.world_width {
            game.world_width = width;
        }
        if let Some(height) = self.world_height {
            game.world_height = height;
        }
        if let Some(max_food) = self.max_food {
            game.max_food = max_food;
        }

        let config = ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_clients: self.max_clients,
            seed: self.seed,
            game,
            ..ServerConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}
