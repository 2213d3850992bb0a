//! Server core
//!
//! Binds the listener, accepts connections and hands each one to the upgrade path.

use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::matchmaking::{Matchmaker, MatchmakerHandle, Notices};
use crate::server::upgrade::handle_new_connection;

pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    matchmaker: MatchmakerHandle,
    matchmaker_task: JoinHandle<()>,
}

impl Server {
    /// Bind the listener and start the matchmaker.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.socket_addr();

        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                return Err(ServerError::Bind { addr, source: e });
            }
        };

        let (matchmaker, matchmaker_task) =
            Matchmaker::spawn_with_timeout(Notices::from(&config), config.write_timeout());

        Ok(Self {
            listener,
            config: Arc::new(config),
            matchmaker,
            matchmaker_task,
        })
    }

    /// Address the listener actually bound to (resolves port `0`).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn matchmaker(&self) -> MatchmakerHandle {
        self.matchmaker.clone()
    }

    /// Accept connections until `shutdown` resolves, then close every client.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let ws_path: Arc<str> = Arc::from(self.config.ws_path.as_str());
        info!(
            "Starting RAX chat server on ws://{}{}",
            self.local_addr()?,
            ws_path
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let matchmaker = self.matchmaker.clone();
                        let ws_path = Arc::clone(&ws_path);

                        // Spawn a task for each connection so the handshake doesn't block accept
                        tokio::spawn(handle_new_connection(stream, addr, ws_path, matchmaker));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        }

        self.matchmaker.shutdown().await?;
        if let Err(e) = self.matchmaker_task.await {
            error!("Matchmaker task failed: {}", e);
        }

        info!("Server shut down");
        Ok(())
    }
}
