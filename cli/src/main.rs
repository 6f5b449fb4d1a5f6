//! DM console: drives a battleboard server over its websocket frame protocol.
//!
//! Each invocation connects, joins the target map, performs one operation,
//! prints the server's reply as JSON, and exits. Useful for scripting combat
//! from the table and for poking a running server during development.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use client::sync;
use frames::{Frame, Status};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "battleboard-cli", about = "Battleboard websocket DM console")]
struct Cli {
    #[arg(long, env = "BATTLEBOARD_WS_URL", default_value = "ws://127.0.0.1:3000/api/ws")]
    url: String,

    /// Map to join before running the command.
    #[arg(long, env = "BATTLEBOARD_MAP_ID")]
    map_id: Uuid,

    /// Seconds to wait for each server reply.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the join snapshot (tokens, fog, encounter, roster).
    Snapshot,
    Token(TokenCommand),
    Fog(FogCommand),
    Combat(CombatCommand),
}

#[derive(Args, Debug)]
struct TokenCommand {
    #[command(subcommand)]
    command: TokenSubcommand,
}

#[derive(Subcommand, Debug)]
enum TokenSubcommand {
    /// Place a new token.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long, default_value = "medium")]
        size: String,
    },
    /// Commit a token position.
    Move {
        token_id: Uuid,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long, default_value_t = 0)]
        version: i32,
    },
    /// Delete a token.
    Delete { token_id: Uuid },
}

#[derive(Args, Debug)]
struct FogCommand {
    #[command(subcommand)]
    command: FogSubcommand,
}

#[derive(Subcommand, Debug)]
enum FogSubcommand {
    /// Flip the reveal-whole-map master switch.
    Reveal {
        #[arg(long, default_value_t = 0)]
        version: i32,
        /// Hide the map again instead of revealing it.
        #[arg(long)]
        hide: bool,
    },
    /// Clear all fog shapes.
    Clear {
        #[arg(long, default_value_t = 0)]
        version: i32,
    },
}

#[derive(Args, Debug)]
struct CombatCommand {
    #[command(subcommand)]
    command: CombatSubcommand,
}

#[derive(Subcommand, Debug)]
enum CombatSubcommand {
    /// Start an encounter on the joined map.
    Start {
        #[arg(long, default_value = "Encounter")]
        name: String,
    },
    /// End an encounter (history is retained).
    End { encounter_id: Uuid },
    /// Add a token to the roster.
    Add {
        encounter_id: Uuid,
        token_id: Uuid,
        #[arg(long)]
        initiative: i32,
        #[arg(long)]
        turn_order: Option<i32>,
    },
    /// Advance the turn cursor.
    Next { encounter_id: Uuid },
    /// Retreat the turn cursor.
    Prev { encounter_id: Uuid },
    /// Print the roster in turn order.
    Roster { encounter_id: Uuid },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut conn = Connection::open(&cli.url, Duration::from_secs(cli.timeout)).await?;

    // Join first: every other syscall is gated on a joined map.
    let join_reply = conn.request(sync::join_map(cli.map_id)).await?;

    let request = match cli.command {
        Command::Snapshot => {
            print_json(&join_reply)?;
            return Ok(());
        }
        Command::Token(token) => match token.command {
            TokenSubcommand::Create { name, x, y, size } => {
                let size = serde_json::from_value(serde_json::json!(size))?;
                sync::create_token(&name, x, y, size, None)
            }
            TokenSubcommand::Move { token_id, x, y, version } => {
                sync::move_token(token_id, x, y, version)
            }
            TokenSubcommand::Delete { token_id } => sync::delete_token(token_id),
        },
        Command::Fog(fog) => match fog.command {
            FogSubcommand::Reveal { version, hide } => sync::reveal_fog(!hide, version),
            FogSubcommand::Clear { version } => sync::commit_fog(&[], version),
        },
        Command::Combat(combat) => match combat.command {
            CombatSubcommand::Start { name } => sync::start_combat(&name),
            CombatSubcommand::End { encounter_id } => sync::end_combat(encounter_id),
            CombatSubcommand::Add { encounter_id, token_id, initiative, turn_order } => {
                sync::add_participant(encounter_id, token_id, initiative, turn_order)
            }
            CombatSubcommand::Next { encounter_id } => sync::next_turn(encounter_id),
            CombatSubcommand::Prev { encounter_id } => sync::prev_turn(encounter_id),
            CombatSubcommand::Roster { encounter_id } => sync::fetch_roster(encounter_id),
        },
    };

    let reply = conn.request(request).await?;
    print_json(&reply)?;
    Ok(())
}

fn print_json(data: &frames::Data) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// One websocket connection with request/response correlation.
struct Connection {
    socket: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    timeout: Duration,
}

impl Connection {
    async fn open(url: &str, timeout: Duration) -> Result<Self, CliError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| CliError::WsConnect(Box::new(e)))?;
        let mut conn = Self { socket, timeout };

        // The server greets with session:connected before accepting syscalls.
        let welcome = conn.next_frame().await?;
        if welcome.syscall != "session:connected" {
            return Err(CliError::ServerError {
                syscall: welcome.syscall,
                message: "expected session:connected greeting".into(),
            });
        }
        Ok(conn)
    }

    /// Send a request and wait for its terminal reply, skipping unrelated
    /// broadcast frames (change events from other clients).
    async fn request(&mut self, frame: Frame) -> Result<frames::Data, CliError> {
        let request_id = frame.id;
        let json = serde_json::to_string(&frame)?;
        self.socket
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| CliError::WsClosed)?;

        loop {
            let reply = self.next_frame().await?;
            if reply.parent_id != Some(request_id) {
                continue;
            }
            match reply.status {
                Status::Done => return Ok(reply.data),
                Status::Error => {
                    let message = reply
                        .data
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    return Err(CliError::ServerError { syscall: reply.syscall, message });
                }
                _ => {}
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Frame, CliError> {
        loop {
            let msg = tokio::time::timeout(self.timeout, self.socket.next())
                .await
                .map_err(|_| CliError::Timeout)?
                .ok_or(CliError::WsClosed)?
                .map_err(|_| CliError::WsClosed)?;

            match msg {
                Message::Text(text) => {
                    if let Ok(frame) = serde_json::from_str::<Frame>(&text) {
                        return Ok(frame);
                    }
                }
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    }
}
