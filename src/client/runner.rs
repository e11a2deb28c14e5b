//! Client execution logic with reconnection support.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::session::run_client_session;

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL_SECS: u64 = 5;

/// Run the chat client, reconnecting on connection loss and rejoining
/// whatever room the user was last in.
pub async fn run_client(
    url: String,
    user_id: String,
    display_name: String,
    initial_room: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let active_room = Arc::new(Mutex::new(initial_room));
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} as '{}' (attempt {}/{})",
            url,
            display_name,
            reconnect_count + 1,
            MAX_RECONNECT_ATTEMPTS
        );

        match run_client_session(&url, &user_id, &display_name, active_room.clone()).await {
            Ok(_) => {
                tracing::info!("Client session ended normally");
                break;
            }
            Err(e) => {
                tracing::warn!("Connection lost: {}", e);
                reconnect_count += 1;

                if reconnect_count >= MAX_RECONNECT_ATTEMPTS {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Exiting.",
                        MAX_RECONNECT_ATTEMPTS
                    );
                    return Err(e);
                }

                tracing::info!("Reconnecting in {} seconds...", RECONNECT_INTERVAL_SECS);
                tokio::time::sleep(Duration::from_secs(RECONNECT_INTERVAL_SECS)).await;
            }
        }
    }

    Ok(())
}
