//! Module `client`
//!
//! Defines the `Client` identity wrapping one connection handle, and the
//! `ClientId` sequence used as its map key.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::connection::ConnectionHandle;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, process-unique identity of a connected client.
///
/// Stays valid as a lookup key after the handle itself has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocates the next identity in the process-wide sequence.
    pub fn next() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// A connected chat client.
///
/// Cloning is cheap and every clone refers to the same handle. Equality is
/// by identity only.
#[derive(Clone)]
pub struct Client {
    id: ClientId,
    handle: Arc<dyn ConnectionHandle>,
    peer_addr: Option<SocketAddr>,
}

impl Client {
    /// Wraps a freshly accepted connection under a new identity.
    pub fn new(handle: Arc<dyn ConnectionHandle>) -> Self {
        Self {
            id: ClientId::next(),
            handle,
            peer_addr: None,
        }
    }

    /// Records the remote socket address, used for logging.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the client's connection handle.
    pub fn handle(&self) -> &Arc<dyn ConnectionHandle> {
        &self.handle
    }

    /// Returns the client's socket address if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Client {}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer_addr {
            Some(addr) => write!(f, "{} ({})", self.id, addr),
            None => write!(f, "{}", self.id),
        }
    }
}
