//! Read-only HTTP routes served on the game port.
//!
//! Every accepted socket is sniffed before the WebSocket handshake. A request
//! line for `/api/...` is answered here with JSON and the socket is closed;
//! anything else goes on to the WebSocket upgrade. The answers come from the
//! main loop through [`ServerEvent::Api`], so this module never sees game
//! state directly.

use crate::network::ServerEvent;
use log::{debug, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

/// Largest request head looked at before deciding.
const SNIFF_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoute {
    /// `{status, players, foods, uptime}`
    Status,
    /// Top players as `{id, name, score, length}`
    Leaderboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    WebSocket,
    Api(ApiRoute),
    NotFound,
}

/// Classifies a request by its first line. Only `/api/` paths are HTTP.
pub fn classify(head: &str) -> RequestKind {
    let mut parts = head.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    let path = path.split('?').next().unwrap_or("").trim_end_matches('/');

    if !path.starts_with("/api/") {
        return RequestKind::WebSocket;
    }
    match (method, path) {
        ("GET", "/api/status") => RequestKind::Api(ApiRoute::Status),
        ("GET", "/api/leaderboard") => RequestKind::Api(ApiRoute::Leaderboard),
        _ => RequestKind::NotFound,
    }
}

/// Peeks at the request line without consuming it, so a WebSocket upgrade
/// still sees the whole handshake.
pub async fn sniff(stream: &TcpStream) -> std::io::Result<RequestKind> {
    let mut buf = [0u8; SNIFF_LIMIT];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(RequestKind::WebSocket);
        }
        if n == buf.len() || buf[..n].windows(2).any(|w| w == b"\r\n") {
            return Ok(classify(&String::from_utf8_lossy(&buf[..n])));
        }
        // Partial line; peek returns the same bytes until more arrive
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Answers one HTTP request and closes the socket.
pub async fn serve(
    mut stream: TcpStream,
    addr: SocketAddr,
    kind: RequestKind,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let (status, body) = match kind {
        RequestKind::Api(route) => {
            let (reply, answer) = oneshot::channel();
            if event_tx.send(ServerEvent::Api { route, reply }).is_err() {
                ("503 Service Unavailable", error_body("Server stopping"))
            } else {
                match answer.await {
                    Ok(body) => ("200 OK", body),
                    Err(_) => ("500 Internal Server Error", error_body("Internal error")),
                }
            }
        }
        RequestKind::NotFound | RequestKind::WebSocket => ("404 Not Found", error_body("Not found")),
    };
    debug!("HTTP {:?} from {}: {}", kind, addr, status);

    // The head is already buffered; read it so closing does not reset the socket
    let mut request = [0u8; 4096];
    let _ = stream.read(&mut request).await;

    let response = format!(
        "HTTP/1.1 {}\r\n\
        Content-Type: application/json\r\n\
        Access-Control-Allow-Origin: *\r\n\
        Content-Length: {}\r\n\
        Connection: close\r\n\
        \r\n\
        {}",
        status,
        body.len(),
        body,
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!("HTTP response to {} failed: {}", addr, e);
        return;
    }
    let _ = stream.shutdown().await;
}

fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
