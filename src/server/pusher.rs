//! Message delivery to connected clients.
//!
//! The WebSocket itself is created in the handler; this layer only
//! manages the per-connection sender channels and pushes serialized
//! frames into them.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::relay::ConnectionId;

/// Sender half of a connection's outbound channel.
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[derive(Debug, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(ConnectionId),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// Delivery abstraction so the dispatch path can be tested without
/// sockets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    async fn register(&self, id: ConnectionId, sender: PusherChannel);

    async fn unregister(&self, id: ConnectionId);

    /// Send to one connection. Missing connections are an error here;
    /// callers that tolerate races should use `broadcast`.
    async fn push_to(&self, id: ConnectionId, content: &str) -> Result<(), MessagePushError>;

    /// Send to every target. Per-target failures (a target disconnected
    /// mid-delivery) are logged and skipped, not propagated.
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        content: &str,
    ) -> Result<(), MessagePushError>;
}

/// WebSocket-backed pusher: a map of connection id to unbounded sender.
#[derive(Default)]
pub struct WebSocketMessagePusher {
    clients: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register(&self, id: ConnectionId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        clients.insert(id, sender);
        tracing::debug!("connection '{}' registered with pusher", id);
    }

    async fn unregister(&self, id: ConnectionId) {
        let mut clients = self.clients.lock().await;
        clients.remove(&id);
        tracing::debug!("connection '{}' unregistered from pusher", id);
    }

    async fn push_to(&self, id: ConnectionId, content: &str) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;
        let sender = clients
            .get(&id)
            .ok_or(MessagePushError::ConnectionNotFound(id))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;
        for target in targets {
            match clients.get(&target) {
                Some(sender) => {
                    if let Err(e) = sender.send(content.to_string()) {
                        tracing::warn!("failed to push to connection '{}': {}", target, e);
                    }
                }
                None => {
                    // Target disconnected between resolution and delivery.
                    tracing::debug!("connection '{}' gone before delivery, skipping", target);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered_pair() -> (WebSocketMessagePusher, ConnectionId) {
        (WebSocketMessagePusher::new(), ConnectionId::new())
    }

    #[tokio::test]
    async fn test_push_to_registered_connection() {
        // given:
        let (pusher, id) = registered_pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        pusher.register(id, tx).await;

        // when:
        let result = pusher.push_to(id, "hello").await;

        // then:
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_unknown_connection_errors() {
        // given:
        let (pusher, id) = registered_pair();

        // when:
        let result = pusher.push_to(id, "hello").await;

        // then:
        assert!(matches!(
            result,
            Err(MessagePushError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_targets() {
        // given:
        let pusher = WebSocketMessagePusher::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        pusher.register(a, tx_a).await;
        pusher.register(b, tx_b).await;

        // when:
        let result = pusher.broadcast(vec![a, b], "fan-out").await;

        // then:
        assert!(result.is_ok());
        assert_eq!(rx_a.recv().await, Some("fan-out".to_string()));
        assert_eq!(rx_b.recv().await, Some("fan-out".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_missing_target() {
        // given: one live target, one already gone
        let pusher = WebSocketMessagePusher::new();
        let a = ConnectionId::new();
        let ghost = ConnectionId::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        pusher.register(a, tx_a).await;

        // when:
        let result = pusher.broadcast(vec![a, ghost], "fan-out").await;

        // then:
        assert!(result.is_ok());
        assert_eq!(rx_a.recv().await, Some("fan-out".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_empty_targets_is_ok() {
        // given:
        let pusher = WebSocketMessagePusher::new();

        // when:
        let result = pusher.broadcast(vec![], "nobody home").await;

        // then:
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        // given:
        let (pusher, id) = registered_pair();
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher.register(id, tx).await;

        // when:
        pusher.unregister(id).await;

        // then:
        assert!(pusher.push_to(id, "late").await.is_err());
    }
}
