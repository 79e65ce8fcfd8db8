//! Session management for connected WebSocket clients
//!
//! This module handles the server-side bookkeeping for every open connection:
//! - Connection lifecycle (connect, join, leave, disconnect)
//! - Binding a connection to at most one live player
//! - Outbound delivery through each connection's bounded queue
//! - Liveness tracking for the advisory ping/pong exchange
//!
//! Sessions never touch the socket directly. Each one holds the sending half
//! of a bounded channel drained by that connection's writer task, so a slow
//! client can only lose its own frames and never stalls the tick.

use crate::game::GameState;
use crate::world::{Player, World};
use log::{info, warn};
use shared::{
    palette_color, Food, GameConfig, JoinRequest, MoveRequest, PlayerId, Point, ServerMessage,
};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Server-assigned identifier for a transport connection.
pub type ConnectionId = u64;

const MAX_COLOR_LEN: usize = 32;
const DEFAULT_NAME: &str = "Player";

/// A frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// One open connection and the player it controls, if any.
#[derive(Debug)]
pub struct Session {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    /// Player bound to this connection. `None` before join and after the
    /// player leaves or is eaten.
    pub player_id: Option<PlayerId>,
    pub connected_at: Instant,
    /// Last time any message arrived on this connection
    pub last_seen: Instant,
    sender: mpsc::Sender<Outbound>,
}

impl Session {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            player_id: None,
            connected_at: now,
            last_seen: now,
            sender,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_stale(&self, after: Duration) -> bool {
        self.last_seen.elapsed() > after
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinError {
    UnknownConnection(ConnectionId),
    AlreadyJoined(PlayerId),
    Rejected(String),
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::UnknownConnection(id) => write!(f, "unknown connection {}", id),
            JoinError::AlreadyJoined(id) => write!(f, "already joined as player {}", id),
            JoinError::Rejected(reason) => write!(f, "join rejected: {}", reason),
        }
    }
}

impl std::error::Error for JoinError {}

/// What was left behind when a player was removed from the world.
#[derive(Debug)]
pub struct Departure {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u64,
    pub corpse: Vec<Food>,
}

/// Tracks every open connection and the player bound to it
///
/// Delivery failures are not handled inline. A connection whose queue has
/// closed is recorded and handed back through [`SessionManager::take_closed`]
/// so the server loop can run the normal disconnect path for it.
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
    max_sessions: usize,
    closed: Vec<ConnectionId>,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            closed: Vec::new(),
        }
    }

    /// Registers a new connection
    ///
    /// Returns false if the server is at capacity or the id is already in
    /// use. The caller is responsible for turning the connection away.
    pub fn add_session(&mut self, id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Outbound>) -> bool {
        if self.sessions.len() >= self.max_sessions || self.sessions.contains_key(&id) {
            return false;
        }
        info!("Connection {} opened from {}", id, addr);
        self.sessions.insert(id, Session::new(id, addr, sender));
        true
    }

    pub fn remove_session(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        info!(
            "Connection {} from {} closed after {:.1}s",
            id,
            session.addr,
            session.connected_at.elapsed().as_secs_f32()
        );
        Some(session)
    }

    pub fn session(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn player_of(&self, id: ConnectionId) -> Option<PlayerId> {
        self.sessions.get(&id).and_then(|s| s.player_id)
    }

    pub fn connection_of(&self, player_id: PlayerId) -> Option<ConnectionId> {
        self.sessions
            .values()
            .find(|s| s.player_id == Some(player_id))
            .map(|s| s.id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn touch(&mut self, id: ConnectionId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.touch();
        }
    }

    /// Connections that have been silent for longer than `after`.
    pub fn stale_sessions(&self, after: Duration) -> Vec<ConnectionId> {
        self.sessions
            .values()
            .filter(|s| s.is_stale(after))
            .map(|s| s.id)
            .collect()
    }

    /// Creates a player for this connection and announces it
    ///
    /// The name and cosmetics are cleaned up, the snake is placed at the
    /// requested position (clamped) or at a random point, and the initial
    /// body is built from the client's segment list with bad entries
    /// replaced by the spawn point. The joiner gets a full snapshot carrying
    /// its own id and everyone else gets `playerJoined`.
    pub fn join(&mut self, conn_id: ConnectionId, request: JoinRequest, game: &mut GameState) -> Result<PlayerId, JoinError> {
        let session = self
            .sessions
            .get(&conn_id)
            .ok_or(JoinError::UnknownConnection(conn_id))?;
        if let Some(existing) = session.player_id {
            return Err(JoinError::AlreadyJoined(existing));
        }

        let config = game.config().clone();
        let radius = config.initial_radius.max(config.min_radius);
        let spawn = match (request.x, request.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                game.world.clamp_point(Point::new(x, y), radius)
            }
            _ => game.random_spawn_point(),
        };

        let id = game.world.allocate_player_id();
        let name = sanitize_name(request.name.as_deref(), config.max_name_len);
        let color = sanitize_color(request.color.as_deref()).unwrap_or_else(|| palette_color(id));
        let mut player = Player::new(id, name.clone(), color, request.head.unwrap_or(0), spawn, radius);
        player.segments = initial_segments(request.segments.as_deref(), spawn, &game.world, &config);

        if !game.world.add_player(player) {
            return Err(JoinError::Rejected(format!("player id {} already in use", id)));
        }
        if let Some(session) = self.sessions.get_mut(&conn_id) {
            session.player_id = Some(id);
        }
        info!("Player {} ({}) joined on connection {}", id, name, conn_id);

        self.send_to(conn_id, &ServerMessage::GameState(game.snapshot(Some(id))));
        self.broadcast(&ServerMessage::PlayerJoined { id, name }, Some(conn_id));
        Ok(id)
    }

    /// Applies a move request from a joined connection. Returns false if
    /// the connection has no live player.
    pub fn update_intent(&mut self, conn_id: ConnectionId, request: &MoveRequest, game: &mut GameState) -> bool {
        match self.player_of(conn_id) {
            Some(player_id) => game.set_intent(player_id, request.target(), request.boost),
            None => false,
        }
    }

    pub fn update_boost(&mut self, conn_id: ConnectionId, active: bool, game: &mut GameState) -> bool {
        match self.player_of(conn_id) {
            Some(player_id) => game.set_boost(player_id, active),
            None => false,
        }
    }

    /// Removes the connection's player, scatters its body as food and tells
    /// everyone. The connection stays open. Calling it again, or for a
    /// connection whose player was already eaten, does nothing.
    pub fn leave(&mut self, conn_id: ConnectionId, game: &mut GameState) -> Option<Departure> {
        let player_id = self.sessions.get_mut(&conn_id)?.player_id.take()?;
        let (player, corpse) = game.remove_player(player_id)?;
        info!(
            "Player {} ({}) left with score {}",
            player.id, player.name, player.score
        );

        self.broadcast(
            &ServerMessage::PlayerLeft {
                id: player.id,
                name: player.name.clone(),
            },
            None,
        );
        for food in &corpse {
            self.broadcast(&ServerMessage::FoodSpawned(food.clone()), None);
        }

        Some(Departure {
            player_id: player.id,
            name: player.name,
            score: player.score,
            corpse,
        })
    }

    /// Full cleanup for a closed transport: leave, then forget the session.
    pub fn disconnect(&mut self, conn_id: ConnectionId, game: &mut GameState) -> Option<Departure> {
        let departure = self.leave(conn_id, game);
        self.remove_session(conn_id);
        departure
    }

    /// Unbinds a player that died in the simulation, so a later leave or
    /// disconnect on its connection has nothing left to clean up.
    pub fn detach_player(&mut self, player_id: PlayerId) -> Option<ConnectionId> {
        let session = self
            .sessions
            .values_mut()
            .find(|s| s.player_id == Some(player_id))?;
        session.player_id = None;
        Some(session.id)
    }

    pub fn send_to(&mut self, conn_id: ConnectionId, message: &ServerMessage) -> bool {
        match message.encode() {
            Ok(text) => self.deliver(conn_id, Outbound::Text(text)),
            Err(e) => {
                warn!("Failed to encode message for connection {}: {}", conn_id, e);
                false
            }
        }
    }

    /// Sends one message to every session except `except`. The message is
    /// encoded once. Returns how many queues accepted it.
    pub fn broadcast(&mut self, message: &ServerMessage, except: Option<ConnectionId>) -> usize {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return 0;
            }
        };

        let targets: Vec<ConnectionId> = self
            .sessions
            .keys()
            .copied()
            .filter(|id| Some(*id) != except)
            .collect();
        targets
            .into_iter()
            .filter(|id| self.deliver(*id, Outbound::Text(text.clone())))
            .count()
    }

    /// Asks the connection's writer to send a close frame and stop.
    pub fn close(&mut self, conn_id: ConnectionId) -> bool {
        self.deliver(conn_id, Outbound::Close)
    }

    pub fn close_all(&mut self) {
        for id in self.connection_ids() {
            self.close(id);
        }
    }

    /// Connections found closed since the last call.
    pub fn take_closed(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.closed)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn deliver(&mut self, conn_id: ConnectionId, outbound: Outbound) -> bool {
        let Some(session) = self.sessions.get(&conn_id) else {
            return false;
        };
        match session.sender.try_send(outbound) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for connection {}, dropping frame", conn_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                if !self.closed.contains(&conn_id) {
                    self.closed.push(conn_id);
                }
                false
            }
        }
    }
}

/// Trims, strips control characters and caps the length. Empty names
/// become "Player".
pub fn sanitize_name(name: Option<&str>, max_len: usize) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(max_len)
        .collect();
    let cleaned = cleaned.trim_end().to_string();
    if cleaned.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        cleaned
    }
}

fn sanitize_color(color: Option<&str>) -> Option<String> {
    color
        .map(str::trim)
        .filter(|c| !c.is_empty() && c.len() <= MAX_COLOR_LEN && !c.chars().any(char::is_control))
        .map(str::to_string)
}

/// Builds the starting body from the client's segment list: at most
/// `initial_segments` entries, each clamped into the arena, with origin or
/// non-finite entries moved to the spawn point, padded at the spawn point.
pub fn initial_segments(requested: Option<&[Point]>, spawn: Point, world: &World, config: &GameConfig) -> Vec<Point> {
    let count = config.initial_segments.max(1);
    let mut segments: Vec<Point> = requested
        .unwrap_or_default()
        .iter()
        .take(count)
        .map(|p| {
            if !p.is_finite() || *p == Point::ORIGIN {
                spawn
            } else {
                world.clamp_point(*p, 0.0)
            }
        })
        .collect();
    segments.resize(count, spawn);
    segments
}
