//! Client management
//!
//! Client identity and its connection handle.

pub mod state;

pub use state::{Client, ClientId};
