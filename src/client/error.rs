//! Client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level connection failure.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}
