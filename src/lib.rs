//! RAX Chat Server
//!
//! Pairs anonymous WebSocket clients two by two and relays every message
//! verbatim to the partner until either side disconnects.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod matchmaking;
pub mod relay;
pub mod server;
pub mod utils;

pub use crate::config::ServerConfig;
pub use server::Server;
