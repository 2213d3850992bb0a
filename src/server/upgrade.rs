//! WebSocket upgrade
//!
//! Performs the handshake on the configured path and hands the resulting
//! client to the matchmaker.

use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::client::Client;
use crate::connection::WebSocketConnection;
use crate::matchmaking::MatchmakerHandle;

/// Upgrade an accepted socket and register it for pairing.
///
/// Handshake failures, including requests for any path other than `ws_path`,
/// are logged and the connection is dropped without entering matchmaking.
pub async fn handle_new_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ws_path: Arc<str>,
    matchmaker: MatchmakerHandle,
) {
    let expected = ws_path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == &*expected {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket upgrade failed for {}: {}", peer_addr, e);
            return;
        }
    };

    let connection = WebSocketConnection::new(ws_stream, peer_addr);
    let client = Client::new(Arc::new(connection)).with_peer_addr(peer_addr);
    info!("Client connected: {}", client);

    if let Err(e) = matchmaker.register(client.clone()) {
        warn!("Dropping {}: {}", client, e);
        client.handle().close().await;
    }
}
