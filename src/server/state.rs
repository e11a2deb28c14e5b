//! Shared server state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::relay::Relay;

use super::pusher::MessagePusher;

/// Shared application state.
///
/// The relay core sits behind one mutex: every inbound event is
/// processed as a single critical section (state mutation plus audience
/// resolution), which is the whole concurrency story. The pusher only
/// carries already-resolved deliveries and never touches relay state.
pub struct AppState {
    pub relay: Mutex<Relay>,
    pub pusher: Arc<dyn MessagePusher>,
}
