//! Connection handle contract
//!
//! Defines the `ConnectionHandle` trait and the opaque `Payload` it carries.

use async_trait::async_trait;
use std::fmt;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ConnectionError;

/// One message as received from or sent to a client.
///
/// The server never inspects the contents; the variant only preserves the
/// frame kind so a text frame is forwarded as text and a binary frame as binary.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Payload::Binary(data.into())
    }

    /// Raw bytes of the payload regardless of frame kind
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Convert a WebSocket data frame into a payload.
    ///
    /// Control frames (ping, pong, close, raw frames) carry no chat data and
    /// yield `None`.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Payload::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(Payload::Binary(data.to_vec())),
            _ => None,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Payload::Text(text) => Message::text(text),
            Payload::Binary(data) => Message::binary(data),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => write!(f, "Text({:?})", text),
            Payload::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

/// A client's live duplex message channel.
///
/// Implementations must uphold three guarantees:
///
/// - a remote close or network loss surfaces as an `Err` from [`recv`](Self::recv);
/// - `send` and `recv` may run concurrently from two different tasks;
/// - [`close`](Self::close) is idempotent, and once it has been called any
///   pending or later `recv`/`send` fails with [`ConnectionError::Closed`].
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Wait for the next message from the client.
    async fn recv(&self) -> Result<Payload, ConnectionError>;

    /// Deliver one message to the client.
    async fn send(&self, payload: Payload) -> Result<(), ConnectionError>;

    /// Close the channel. Calling this more than once is a no-op.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}
