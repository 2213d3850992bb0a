//! Server core functionality
//!
//! This module contains the listener, the accept loop and the WebSocket
//! upgrade that turns an accepted socket into a registered client.

pub mod core;
pub mod upgrade;

pub use self::core::Server;
