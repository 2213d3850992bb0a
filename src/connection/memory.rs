//! In-memory connection handle
//!
//! A channel-backed `ConnectionHandle` paired with a `MemoryPeer` that plays
//! the remote client. Used to drive the matchmaker without sockets.

use async_trait::async_trait;
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionHandle, Payload};
use crate::error::ConnectionError;

/// Server side of an in-memory channel.
pub struct MemoryConnection {
    inbound: Mutex<mpsc::UnboundedReceiver<Payload>>,
    outbound: StdMutex<Option<mpsc::UnboundedSender<Payload>>>,
    closed: CancellationToken,
}

/// Client side of an in-memory channel.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Payload>>,
    outbound: mpsc::UnboundedReceiver<Payload>,
    closed: CancellationToken,
}

impl MemoryConnection {
    /// Create a connected handle/peer pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let connection = MemoryConnection {
            inbound: Mutex::new(inbound_rx),
            outbound: StdMutex::new(Some(outbound_tx)),
            closed: closed.clone(),
        };
        let peer = MemoryPeer {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
            closed,
        };
        (connection, peer)
    }

    fn outbound(&self) -> Option<mpsc::UnboundedSender<Payload>> {
        match self.outbound.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ConnectionHandle for MemoryConnection {
    async fn recv(&self) -> Result<Payload, ConnectionError> {
        let mut inbound = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(ConnectionError::Closed),
            guard = self.inbound.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            next = inbound.recv() => next.ok_or(ConnectionError::Closed),
        }
    }

    async fn send(&self, payload: Payload) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        let outbound = self.outbound().ok_or(ConnectionError::Closed)?;
        outbound.send(payload).map_err(|_| ConnectionError::Closed)
    }

    async fn close(&self) {
        self.closed.cancel();
        // dropping the sender lets the peer drain what was sent, then see end-of-stream
        let sender = match self.outbound.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl MemoryPeer {
    /// Send a message to the server. Returns `false` once disconnected.
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        match &self.inbound {
            Some(inbound) => inbound.send(payload.into()).is_ok(),
            None => false,
        }
    }

    /// Wait for the next message from the server.
    ///
    /// Returns `None` once the server closed the connection and every message
    /// sent before the close has been read.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.outbound.recv().await
    }

    /// Take a message that has already arrived, without waiting.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.outbound.try_recv().ok()
    }

    /// Simulate the client dropping its connection.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Whether the server side has closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Wait until the server side closes this connection.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_flow_both_ways() {
        let (connection, mut peer) = MemoryConnection::pair();

        assert!(peer.send("hi"));
        assert_eq!(connection.recv().await.unwrap(), Payload::text("hi"));

        connection.send(Payload::binary(vec![1, 2, 3])).await.unwrap();
        assert_eq!(peer.recv().await, Some(Payload::binary(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn peer_disconnect_fails_recv() {
        let (connection, mut peer) = MemoryConnection::pair();
        peer.disconnect();

        assert!(matches!(connection.recv().await, Err(ConnectionError::Closed)));
        assert!(!peer.send("late"));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_wakes_pending_recv() {
        let (connection, mut peer) = MemoryConnection::pair();
        let connection = std::sync::Arc::new(connection);

        let reader = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.recv().await })
        };
        tokio::task::yield_now().await;

        connection.send(Payload::text("bye")).await.unwrap();
        connection.close().await;
        connection.close().await;

        assert!(matches!(reader.await.unwrap(), Err(ConnectionError::Closed)));
        assert!(connection.is_closed());
        assert!(peer.is_closed());
        assert!(connection.send(Payload::text("again")).await.is_err());

        assert_eq!(peer.recv().await, Some(Payload::text("bye")));
        assert_eq!(peer.recv().await, None);
    }
}
