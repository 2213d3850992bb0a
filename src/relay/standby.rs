//! Waiting-client watcher
//!
//! A queued client has no relay reading from it, so nothing would notice it
//! leaving. This task reads on its behalf until it is paired or goes away.

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::matchmaking::MatchmakerHandle;
use crate::relay::report_disconnect;

/// Watches a waiting client until `paired` is cancelled or its connection fails.
///
/// Messages sent while waiting have no recipient and are discarded. Once
/// `paired` is cancelled the task returns without touching the handle again,
/// leaving it free for the relays.
pub async fn watch_waiting(client: Client, matchmaker: MatchmakerHandle, paired: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = paired.cancelled() => return,
            result = client.handle().recv() => match result {
                Ok(payload) => {
                    debug!("Discarding {} bytes from waiting {}", payload.len(), client);
                }
                Err(e) => {
                    info!("Waiting {} disconnected: {}", client, e);
                    report_disconnect(&matchmaker, client);
                    return;
                }
            }
        }
    }
}
