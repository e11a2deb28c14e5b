//! WebSocket client session management.

use std::io::Write as _;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};
use uuid::Uuid;

use crate::{
    common::time::unix_millis,
    protocol::{ClientEvent, MessagePayload, ServerEvent},
};

use super::{error::ClientError, formatter::MessageFormatter, view::ChatView};

type WsSink =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, Message>;

/// Redisplay the prompt after printing asynchronous output.
fn redisplay_prompt(name: &str) {
    print!("{}> ", name);
    std::io::stdout().flush().ok();
}

async fn send_event(write: &mut WsSink, event: &ClientEvent) -> Result<(), ClientError> {
    let json = serde_json::to_string(event)
        .map_err(|e| ClientError::ConnectionError(format!("failed to serialize event: {}", e)))?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))
}

/// Protocol events for one plain chat line: just the message. The relay
/// clears the sender's typing flag on send, so no `stop_typing`
/// accompanies it.
fn chat_events(text: String, room: String, user_id: &str, sender_name: &str) -> Vec<ClientEvent> {
    let now = unix_millis();
    vec![ClientEvent::SendMessage(MessagePayload {
        // Timestamp plus random component, unique enough to dedupe.
        id: format!("{}-{}", now, Uuid::new_v4()),
        text,
        sender_id: user_id.to_string(),
        sender_name: sender_name.to_string(),
        timestamp: now,
        room,
        role: None,
    })]
}

/// Run one client session until the user quits or the connection drops.
///
/// `active_room` is shared with the caller so a reconnect can rejoin
/// whatever room the user last switched to.
pub async fn run_client_session(
    url: &str,
    user_id: &str,
    display_name: &str,
    active_room: Arc<Mutex<String>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    tracing::info!("Connected to chat relay");
    println!(
        "\nYou are '{}'. Type to chat, /join <room> to switch, /rooms for the channel list, /quit to exit.\n",
        display_name
    );

    let (mut write, mut read) = ws_stream.split();

    // Display state shared between the read task (renders events) and
    // the write task (resets it on room switches).
    let view = Arc::new(Mutex::new(ChatView::new()));

    // Join the active room before the prompt appears.
    let initial_room = {
        let room = active_room.lock().expect("active room lock poisoned");
        room.clone()
    };
    if !initial_room.is_empty() {
        send_event(&mut write, &ClientEvent::JoinRoom(initial_room.clone())).await?;
        print!("{}", MessageFormatter::format_room_change(&initial_room));
    }

    // Incoming frames: render messages (deduped by id) and typing notices.
    let name_for_read = display_name.to_string();
    let view_for_read = view.clone();
    let mut read_task = tokio::spawn(async move {
        let mut connection_error = false;

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::ReceiveMessage(msg)) => {
                        let fresh = {
                            let mut view = view_for_read.lock().expect("view lock poisoned");
                            view.record_message(&msg.id)
                        };
                        if fresh {
                            print!("{}", MessageFormatter::format_message(&msg));
                            redisplay_prompt(&name_for_read);
                        }
                    }
                    Ok(ServerEvent::Typing(who)) => {
                        let changed = {
                            let mut view = view_for_read.lock().expect("view lock poisoned");
                            view.typing_started(&who)
                        };
                        if changed {
                            print!("{}", MessageFormatter::format_typing(&who));
                            redisplay_prompt(&name_for_read);
                        }
                    }
                    Ok(ServerEvent::StopTyping(who)) => {
                        let changed = {
                            let mut view = view_for_read.lock().expect("view lock poisoned");
                            view.typing_stopped(&who)
                        };
                        if changed {
                            print!("{}", MessageFormatter::format_stop_typing(&who));
                            redisplay_prompt(&name_for_read);
                        }
                    }
                    Err(e) => {
                        tracing::debug!("ignoring unrecognized frame: {}", e);
                    }
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    connection_error = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    connection_error = true;
                    break;
                }
                _ => {}
            }
        }

        connection_error
    });

    // Blocking thread for rustyline (synchronous readline). Dropping the
    // sender on exit ends the write task, which ends the session.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let prompt_name = display_name.to_string();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_name);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        rl.add_history_entry(line.as_str()).ok();
                        if input_tx.send(line).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Input lines become protocol events.
    let user_id = user_id.to_string();
    let sender_name = display_name.to_string();
    let room_handle = active_room.clone();
    let view_for_write = view.clone();
    let mut write_task = tokio::spawn(async move {
        let mut write_error = false;

        'input: while let Some(line) = input_rx.recv().await {
            if line == "/quit" {
                break;
            }

            if line == "/rooms" {
                print!("{}", MessageFormatter::format_channels());
                redisplay_prompt(&sender_name);
                continue;
            }

            if let Some(new_room) = line.strip_prefix("/join ") {
                let new_room = new_room.trim().to_string();
                if new_room.is_empty() {
                    continue;
                }
                let old_room = {
                    let mut room = room_handle.lock().expect("active room lock poisoned");
                    std::mem::replace(&mut *room, new_room.clone())
                };
                if old_room != new_room {
                    // Typing notices from the old room no longer apply.
                    view_for_write
                        .lock()
                        .expect("view lock poisoned")
                        .reset_room();
                }
                if !old_room.is_empty() && old_room != new_room {
                    if send_event(&mut write, &ClientEvent::LeaveRoom(old_room)).await.is_err() {
                        write_error = true;
                        break 'input;
                    }
                }
                if send_event(&mut write, &ClientEvent::JoinRoom(new_room.clone())).await.is_err() {
                    write_error = true;
                    break 'input;
                }
                print!("{}", MessageFormatter::format_room_change(&new_room));
                redisplay_prompt(&sender_name);
                continue;
            }

            if line == "/leave" {
                let old_room = {
                    let mut room = room_handle.lock().expect("active room lock poisoned");
                    std::mem::take(&mut *room)
                };
                if !old_room.is_empty() {
                    view_for_write
                        .lock()
                        .expect("view lock poisoned")
                        .reset_room();
                    if send_event(&mut write, &ClientEvent::LeaveRoom(old_room.clone())).await.is_err() {
                        write_error = true;
                        break 'input;
                    }
                    print!("{}", MessageFormatter::format_room_left(&old_room));
                    redisplay_prompt(&sender_name);
                }
                continue;
            }

            if line.starts_with('/') {
                print!("\nUnknown command. Try /join <room>, /leave, /rooms, /quit\n");
                redisplay_prompt(&sender_name);
                continue;
            }

            let room = {
                let room = room_handle.lock().expect("active room lock poisoned");
                room.clone()
            };
            if room.is_empty() {
                print!("\nNot in a room. Use /join <room> first.\n");
                redisplay_prompt(&sender_name);
                continue;
            }

            for event in chat_events(line, room, &user_id, &sender_name) {
                if send_event(&mut write, &event).await.is_err() {
                    write_error = true;
                    break 'input;
                }
            }
        }

        write_error
    });

    // If either task completes, tear down the other.
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            if read_result.unwrap_or(false) {
                return Err(Box::new(ClientError::ConnectionError(
                    "Connection lost".to_string(),
                )));
            }
        }
        write_result = &mut write_task => {
            read_task.abort();
            if write_result.unwrap_or(false) {
                return Err(Box::new(ClientError::ConnectionError(
                    "Connection lost".to_string(),
                )));
            }
        }
    }

    Ok(())
}
