//! Connection handles
//!
//! The capability set the matchmaker and relays need from a client's duplex
//! message channel, plus the WebSocket and in-memory implementations.

pub mod handle;
pub mod memory;
pub mod websocket;

pub use handle::{ConnectionHandle, Payload};
pub use memory::{MemoryConnection, MemoryPeer};
pub use websocket::WebSocketConnection;
