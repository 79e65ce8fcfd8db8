//! Server network layer: WebSocket transport and game loop coordination
//!
//! One task accepts TCP connections. Each accepted connection gets a reader
//! task and a writer task. Readers decode inbound JSON and forward it as
//! [`ServerEvent`]s over an unbounded channel. Writers drain that
//! connection's bounded [`Outbound`] queue. The main loop in
//! [`Server::run`] is the only owner of game and session state, so nothing
//! here needs a lock. Plain HTTP requests for `/api/...` on the same port are
//! split off before the handshake and answered through the same loop.

use crate::config::ServerConfig;
use crate::game::{GameEvent, GameState, TickOutcome};
use crate::http_api::{self, ApiRoute, RequestKind};
use crate::session::{ConnectionId, Outbound, SessionManager};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    decode_client_message, get_timestamp, ClientMessage, ProtocolError, ServerMessage,
    ServerStatus,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long a new socket may take to send its request line.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        conn_id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    },
    Message {
        conn_id: ConnectionId,
        message: ClientMessage,
    },
    Malformed {
        conn_id: ConnectionId,
        error: ProtocolError,
    },
    Disconnected {
        conn_id: ConnectionId,
    },
    /// HTTP query; the JSON body goes back on `reply`
    Api {
        route: ApiRoute,
        reply: oneshot::Sender<String>,
    },
    Shutdown,
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    event_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.event_tx.send(ServerEvent::Shutdown).is_err() {
            debug!("Shutdown requested after the server loop exited");
        }
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    config: ServerConfig,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game_state: GameState,
    sessions: SessionManager,
    started_at: Instant,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let mut game_state = GameState::new(config.game.clone(), config.seed);
        let food = game_state.populate();
        info!(
            "World {}x{} stocked with {} food",
            config.game.world_width,
            config.game.world_height,
            food.len()
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Server {
            sessions: SessionManager::new(config.max_clients),
            config,
            listener: Some(listener),
            local_addr,
            game_state,
            started_at: Instant::now(),
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            event_tx: self.event_tx.clone(),
        }
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Spawns the task that accepts connections and hands each to its own task
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let event_tx = self.event_tx.clone();
        let queue = self.config.outbound_queue.max(1);

        tokio::spawn(async move {
            let mut next_conn_id: ConnectionId = 1;
            loop {
                tokio::select! {
                    _ = event_tx.closed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            let conn_id = next_conn_id;
                            next_conn_id += 1;
                            tokio::spawn(handle_connection(stream, addr, conn_id, event_tx.clone(), queue));
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    },
                }
            }
            debug!("Acceptor stopped");
        });
    }

    /// Applies one event. Returns false when the server should stop.
    fn handle_event(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::Connected {
                conn_id,
                addr,
                sender,
            } => {
                if !self.sessions.add_session(conn_id, addr, sender.clone()) {
                    warn!("Rejecting connection {} from {}: server full", conn_id, addr);
                    if let Ok(text) = ServerMessage::error("Server full").encode() {
                        let _ = sender.try_send(Outbound::Text(text));
                    }
                    let _ = sender.try_send(Outbound::Close);
                }
            }
            ServerEvent::Message { conn_id, message } => {
                self.sessions.touch(conn_id);
                self.handle_message(conn_id, message);
            }
            ServerEvent::Malformed { conn_id, error } => {
                warn!("Malformed message on connection {}: {}", conn_id, error);
                self.sessions
                    .send_to(conn_id, &ServerMessage::error(format!("Malformed message: {}", error)));
            }
            ServerEvent::Disconnected { conn_id } => self.disconnect(conn_id),
            ServerEvent::Api { route, reply } => match self.api_response(route) {
                Ok(body) => {
                    let _ = reply.send(body);
                }
                Err(e) => error!("Failed to encode {:?} response: {}", route, e),
            },
            ServerEvent::Shutdown => {
                info!("Server shutting down");
                return false;
            }
        }
        self.reap_closed();
        true
    }

    fn handle_message(&mut self, conn_id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Join(request) => {
                if let Err(e) = self.sessions.join(conn_id, request, &mut self.game_state) {
                    warn!("Join on connection {} failed: {}", conn_id, e);
                    self.sessions.send_to(conn_id, &ServerMessage::error(e.to_string()));
                }
            }
            ClientMessage::Move(request) => {
                if !self.sessions.update_intent(conn_id, &request, &mut self.game_state) {
                    debug!("Move from connection {} ignored: no live player", conn_id);
                }
            }
            ClientMessage::Boost(request) => {
                if !self.sessions.update_boost(conn_id, request.boost, &mut self.game_state) {
                    debug!("Boost from connection {} ignored: no live player", conn_id);
                }
            }
            ClientMessage::Leave => {
                self.sessions.leave(conn_id, &mut self.game_state);
            }
            ClientMessage::GetLeaderboard => {
                let players = self.game_state.current_leaderboard();
                self.sessions.send_to(conn_id, &ServerMessage::Leaderboard { players });
            }
            ClientMessage::Pong(_) => {}
        }
    }

    fn api_response(&self, route: ApiRoute) -> Result<String, serde_json::Error> {
        match route {
            ApiRoute::Status => serde_json::to_string(&ServerStatus {
                status: "online".to_string(),
                players: self.game_state.world.player_count(),
                foods: self.game_state.world.food_count(),
                uptime: self.started_at.elapsed().as_secs_f64(),
            }),
            ApiRoute::Leaderboard => serde_json::to_string(&self.game_state.current_leaderboard()),
        }
    }

    fn disconnect(&mut self, conn_id: ConnectionId) {
        if let Some(departure) = self.sessions.disconnect(conn_id, &mut self.game_state) {
            debug!(
                "Connection {} dropped player {}, {} corpse food",
                conn_id,
                departure.player_id,
                departure.corpse.len()
            );
        }
    }

    /// Runs disconnect cleanup for every connection whose queue was found
    /// closed. Cleanup broadcasts can surface more, so loop until quiet.
    fn reap_closed(&mut self) {
        loop {
            let closed = self.sessions.take_closed();
            if closed.is_empty() {
                break;
            }
            for conn_id in closed {
                self.disconnect(conn_id);
            }
        }
    }

    /// Advances the simulation and broadcasts the results
    fn run_tick(&mut self, dt: Duration) {
        let outcome = self.game_state.step(dt.as_secs_f32() * 1000.0);
        self.broadcast_outcome(outcome);
        self.reap_closed();
    }

    fn broadcast_outcome(&mut self, outcome: TickOutcome) {
        for event in &outcome.events {
            self.sessions.broadcast(&event.to_message(), None);

            if let GameEvent::PlayerDied {
                victim_id,
                killer_name,
                score,
                length,
                ..
            } = event
            {
                if let Some(conn_id) = self.sessions.detach_player(*victim_id) {
                    self.sessions.send_to(
                        conn_id,
                        &ServerMessage::GameOver {
                            killer_name: killer_name.clone(),
                            score: *score,
                            length: *length,
                        },
                    );
                    self.sessions.close(conn_id);
                }
            }
        }

        if self.sessions.is_empty() {
            return;
        }
        let snapshot = self.game_state.snapshot(None);
        self.sessions.broadcast(&ServerMessage::GameState(snapshot), None);
        if outcome.leaderboard_changed {
            let players = self.game_state.leaderboard().to_vec();
            self.sessions.broadcast(&ServerMessage::Leaderboard { players }, None);
        }
    }

    fn ping_all(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        self.sessions.broadcast(
            &ServerMessage::Ping {
                timestamp: get_timestamp(),
            },
            None,
        );
        for conn_id in self
            .sessions
            .stale_sessions(Duration::from_secs(self.config.stale_after_secs))
        {
            debug!("Connection {} has not answered in {}s", conn_id, self.config.stale_after_secs);
        }
        self.reap_closed();
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_acceptor();

        let tick_duration = Duration::from_millis(self.config.game.tick_interval_ms);
        let max_dt = tick_duration * 2;
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ping_interval = interval(Duration::from_secs(self.config.ping_interval_secs.max(1)));
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!(
            "Server started successfully ({}ms ticks, up to {} clients)",
            tick_duration.as_millis(),
            self.config.max_clients
        );

        'main: loop {
            tokio::select! {
                biased;

                _ = tick_interval.tick() => {
                    // Inputs already queued apply before this tick's physics
                    while let Ok(event) = self.event_rx.try_recv() {
                        if !self.handle_event(event) {
                            break 'main;
                        }
                    }

                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).min(max_dt);
                    last_tick = now;
                    self.run_tick(dt);

                    if self.game_state.tick % 100 == 0 {
                        debug!(
                            "Tick {}: {} connections, {} players, {:.1}ms frame",
                            self.game_state.tick,
                            self.sessions.len(),
                            self.game_state.world.player_count(),
                            now.elapsed().as_secs_f32() * 1000.0
                        );
                    }
                }

                event = self.event_rx.recv() => match event {
                    Some(event) => {
                        if !self.handle_event(event) {
                            break 'main;
                        }
                    }
                    None => break 'main,
                },

                _ = ping_interval.tick() => self.ping_all(),
            }
        }

        self.sessions.close_all();
        info!(
            "Server stopped after {} ticks, {} connections closed",
            self.game_state.tick,
            self.sessions.len()
        );
        Ok(())
    }
}

/// Drives one WebSocket connection until either side closes it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn_id: ConnectionId,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    queue: usize,
) {
    match timeout(REQUEST_TIMEOUT, http_api::sniff(&stream)).await {
        Ok(Ok(RequestKind::WebSocket)) => {}
        Ok(Ok(kind)) => {
            http_api::serve(stream, addr, kind, event_tx).await;
            return;
        }
        Ok(Err(e)) => {
            debug!("Reading request from {} failed: {}", addr, e);
            return;
        }
        Err(_) => {
            debug!("{} sent no request within {:?}", addr, REQUEST_TIMEOUT);
            return;
        }
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(queue);

    if event_tx
        .send(ServerEvent::Connected {
            conn_id,
            addr,
            sender: out_tx,
        })
        .is_err()
    {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            let result = match outbound {
                Outbound::Text(text) => ws_sender.send(Message::Text(text)).await,
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!("Send to connection {} failed: {}", conn_id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(frame) = ws_receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Connection {} read error: {}", conn_id, e);
                break;
            }
        };

        let event = match decode_client_message(&text) {
            Ok(message) => ServerEvent::Message { conn_id, message },
            Err(error) => ServerEvent::Malformed { conn_id, error },
        };
        if event_tx.send(event).is_err() {
            break;
        }
    }

    let _ = event_tx.send(ServerEvent::Disconnected { conn_id });
    writer.abort();
}
