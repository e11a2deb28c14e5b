//! Room-based real-time chat relay.
//!
//! Many concurrent WebSocket clients join named channels, exchange text
//! messages, and see ephemeral typing indicators. The relay keeps no
//! history: a message exists only for the moment of fan-out.

pub mod client;
pub mod common;
pub mod protocol;
pub mod relay;
pub mod server;
