//! WebSocket connection handle
//!
//! Wraps an upgraded `tokio-tungstenite` stream. The stream is split so the
//! relay reading from a client and the relay writing to it never contend for
//! the same lock.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionHandle, Payload};
use crate::error::ConnectionError;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRecv = SplitStream<WebSocketStream<TcpStream>>;

/// How long `close` waits to flush a Close frame to a peer that stopped reading.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection handle backed by a server-side WebSocket stream.
pub struct WebSocketConnection {
    sink: Mutex<WsSink>,
    stream: Mutex<WsRecv>,
    closed: CancellationToken,
    close_sent: AtomicBool,
    peer_addr: SocketAddr,
}

impl WebSocketConnection {
    pub fn new(ws_stream: WebSocketStream<TcpStream>, peer_addr: SocketAddr) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
            close_sent: AtomicBool::new(false),
            peer_addr,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

#[async_trait]
impl ConnectionHandle for WebSocketConnection {
    async fn recv(&self) -> Result<Payload, ConnectionError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(ConnectionError::Closed),
            guard = self.stream.lock() => guard,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Err(ConnectionError::Closed),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Close(frame))) => {
                    debug!("Close frame from {}: {:?}", self.peer_addr, frame);
                    return Err(ConnectionError::Closed);
                }
                Some(Ok(message)) => match Payload::from_message(message) {
                    Some(payload) => return Ok(payload),
                    // ping/pong are answered by tungstenite itself
                    None => continue,
                },
                Some(Err(e)) => return Err(ConnectionError::Transport(e)),
                None => return Err(ConnectionError::Closed),
            }
        }
    }

    async fn send(&self, payload: Payload) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        trace!("Sending {:?} to {}", payload, self.peer_addr);

        let mut sink = self.sink.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            result = sink.send(payload.into_message()) => result.map_err(ConnectionError::from),
        }
    }

    async fn close(&self) {
        self.closed.cancel();

        if self.close_sent.swap(true, Ordering::AcqRel) {
            return;
        }

        let handshake = async {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("Close frame to {} not delivered: {}", self.peer_addr, e);
            }
            let _ = sink.close().await;
        };

        match timeout(CLOSE_FRAME_TIMEOUT, handshake).await {
            Ok(()) => debug!("Closed connection to {}", self.peer_addr),
            Err(_) => debug!("Close frame to {} timed out, giving up", self.peer_addr),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
