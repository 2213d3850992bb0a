//! Error types
//!
//! Defines domain-specific error types for each module of the chat server.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Connection handle errors
///
/// Every variant is treated by the relay as "the source went away".
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The remote peer closed the channel, or it was closed locally.
    #[error("connection closed")]
    Closed,
    /// WebSocket transport failure.
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// Matchmaker errors
#[derive(Error, Debug)]
pub enum MatchmakerError {
    /// The matchmaking loop has shut down and no longer accepts events.
    #[error("matchmaker stopped")]
    Stopped,
}

/// General server error covering startup and the accept loop
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("matchmaker error: {0}")]
    Matchmaker(#[from] MatchmakerError),
}
