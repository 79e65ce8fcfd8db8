//! Headless bot that joins a running server, chases the nearest food and
//! prints what it sees.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use shared::{
    BoostRequest, ClientMessage, JoinRequest, MoveRequest, PongData, ServerMessage,
};
use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Snake arena test client")]
struct Args {
    #[clap(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    #[clap(short, long, default_value = "bot")]
    name: String,

    /// How long to play before leaving
    #[clap(short, long, default_value = "10")]
    seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let join = ClientMessage::Join(JoinRequest {
        name: Some(args.name.clone()),
        ..JoinRequest::default()
    });
    ws_sender.send(Message::Text(join.encode()?)).await?;

    let mut rng = rand::thread_rng();
    let mut steer = interval(Duration::from_millis(500));
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut self_id = None;
    let mut world = (2000.0f32, 2000.0f32);
    let mut states = 0u64;
    let mut target: Option<(f32, f32)> = None;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => break,

            _ = steer.tick() => {
                if self_id.is_none() {
                    continue;
                }
                let (x, y) = target.unwrap_or_else(|| (rng.gen_range(0.0..world.0), rng.gen_range(0.0..world.1)));
                let request = MoveRequest {
                    x: Some(x),
                    y: Some(y),
                    boost: None,
                };
                ws_sender.send(Message::Text(ClientMessage::Move(request).encode()?)).await?;
                if rng.gen_bool(0.1) {
                    let boost = ClientMessage::Boost(BoostRequest { boost: true });
                    ws_sender.send(Message::Text(boost.encode()?)).await?;
                }
            }

            frame = ws_receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        println!("Server closed the connection");
                        return Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                match ServerMessage::decode(&text) {
                    Ok(ServerMessage::GameState(snapshot)) => {
                        states += 1;
                        world = (snapshot.world_width, snapshot.world_height);
                        if let Some(id) = snapshot.self_id {
                            println!("Joined as player {}", id);
                            self_id = Some(id);
                        }
                        let me = snapshot.players.iter().find(|p| Some(p.id) == self_id);
                        target = me.and_then(|me| {
                            snapshot
                                .foods
                                .iter()
                                .map(|f| ((f.x - me.x).powi(2) + (f.y - me.y).powi(2), (f.x, f.y)))
                                .min_by(|a, b| a.0.total_cmp(&b.0))
                                .map(|(_, position)| position)
                        });
                        if states % 20 == 0 {
                            if let Some(me) = me {
                                println!(
                                    "Tick {}: at ({:.0}, {:.0}) radius {:.1} score {} length {}, {} players, {} food",
                                    snapshot.tick, me.x, me.y, me.radius, me.score, me.length,
                                    snapshot.player_count, snapshot.foods.len()
                                );
                            }
                        }
                    }
                    Ok(ServerMessage::Ping { timestamp }) => {
                        let pong = ClientMessage::Pong(PongData { timestamp: Some(timestamp as f64) });
                        ws_sender.send(Message::Text(pong.encode()?)).await?;
                    }
                    Ok(ServerMessage::GameOver { killer_name, score, length }) => {
                        println!("Eaten by {} with score {} and length {}", killer_name, score, length);
                    }
                    Ok(ServerMessage::PlayerDied { name, killer_name, .. }) => {
                        println!("{} was eaten by {}", name, killer_name);
                    }
                    Ok(ServerMessage::Error { message }) => println!("Server error: {}", message),
                    Ok(_) => {}
                    Err(e) => println!("Failed to decode server message: {}", e),
                }
            }
        }
    }

    println!("Leaving after {} state updates", states);
    ws_sender.send(Message::Text(ClientMessage::Leave.encode()?)).await?;
    ws_sender.close().await?;
    Ok(())
}
