//! CLI chat client for the room-based relay.
//!
//! Connects to the relay, auto-joins a room, and sends lines from stdin
//! as chat messages. Reconnects automatically (max 5 attempts with a 5
//! second interval), rejoining the last active room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin client -- --name Alice
//! cargo run --bin client -- --name Bob --room rust
//! ```

use clap::Parser;
use uuid::Uuid;

use chat_relay_rs::{client::run_client, common::logger::setup_logger, protocol::DEFAULT_ROOM};

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "CLI client for the room-based chat relay", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Display name shown on messages
    #[arg(short = 'n', long)]
    name: String,

    /// Stable user id; generated when omitted
    #[arg(long)]
    user_id: Option<String>,

    /// Room to join on connect
    #[arg(short = 'r', long, default_value = DEFAULT_ROOM)]
    room: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let user_id = args.user_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = run_client(args.url, user_id, args.name, args.room).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
