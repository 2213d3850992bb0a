//! Message forwarding
//!
//! One task per direction of a pair, copying payloads from one client to the other.

use log::{debug, trace};

use crate::client::Client;
use crate::connection::Payload;
use crate::matchmaking::MatchmakerHandle;
use crate::relay::report_disconnect;

/// Forwards every message from `source` to `destination` until one side fails.
///
/// - Sends `greeting` to `destination` first, so the pairing notice always
///   precedes relayed messages on that handle.
/// - Payloads are passed through untouched, one in flight at a time.
/// - A failed receive unregisters `source`; a failed send unregisters
///   `destination`. Either way the task reports exactly once and returns.
pub async fn relay(
    source: Client,
    destination: Client,
    matchmaker: MatchmakerHandle,
    greeting: Option<Payload>,
) {
    if let Some(greeting) = greeting {
        if let Err(e) = destination.handle().send(greeting).await {
            debug!("Pairing notice to {} failed: {}", destination, e);
            report_disconnect(&matchmaker, destination);
            return;
        }
    }

    let mut forwarded: u64 = 0;

    loop {
        let payload = match source.handle().recv().await {
            Ok(payload) => payload,
            Err(e) => {
                debug!(
                    "Relay {} -> {} stopped after {} messages: {}",
                    source.id(),
                    destination.id(),
                    forwarded,
                    e
                );
                report_disconnect(&matchmaker, source);
                return;
            }
        };

        trace!(
            "Relaying {} bytes {} -> {}",
            payload.len(),
            source.id(),
            destination.id()
        );

        if let Err(e) = destination.handle().send(payload).await {
            debug!("Delivery to {} failed: {}", destination, e);
            report_disconnect(&matchmaker, destination);
            return;
        }
        forwarded += 1;
    }
}
