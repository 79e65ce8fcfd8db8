//! # Snake Arena Server Library
//!
//! Authoritative server for a multiplayer growing-snake arena. Clients connect
//! over WebSocket, send steering targets and boost requests, and receive the
//! whole world back every tick. Every game decision is made here.
//!
//! ## Architecture
//!
//! ### Single-Owner Event Loop
//! One loop owns the [`game::GameState`] and the [`session::SessionManager`].
//! Connection tasks never touch either; they forward decoded messages over a
//! channel. Inputs that arrive between ticks are applied in arrival order
//! before the next tick runs, so a tick always sees a consistent world.
//!
//! ### Tick Pipeline
//! Each tick runs boost expiry and movement for every snake, then collision
//! and consumption, then food replenishment, then the leaderboard. The
//! resulting events, a full snapshot and (when it changed) the leaderboard
//! are broadcast afterwards.
//!
//! ## Module Organization
//!
//! - `world`: the store of players and food, keyed by never-reused ids
//! - `snake`: head steering, chain relaxation and the boost timer
//! - `food`: random food placement, the population floor and corpse food
//! - `collision`: food consumption and player-versus-player eating
//! - `leaderboard`: top-N ranking by score
//! - `game`: the tick pipeline tying the above together
//! - `session`: connections, joins and outbound queues
//! - `network`: the WebSocket transport and the main loop
//! - `http_api`: `GET /api/status` and `GET /api/leaderboard` on the game port
//! - `config`: command-line and file configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::{BoxError, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!     server.run().await
//! }
//! ```

pub mod collision;
pub mod config;
pub mod food;
pub mod game;
pub mod http_api;
pub mod leaderboard;
pub mod network;
pub mod session;
pub mod snake;
pub mod world;
