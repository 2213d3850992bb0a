//! RAX Chat Server - Entry Point
//!
//! Anonymous two-party chat over WebSockets.

use log::{error, info};

use rax_chat_server::utils::logging::setup_logging;
use rax_chat_server::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG takes precedence over the configured level
    setup_logging(&config.log_level);

    info!("Launching chat server...");

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = server.run_until(shutdown).await {
        error!("Server stopped with error: {}", e);
        std::process::exit(1);
    }
}
