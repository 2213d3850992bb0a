//! Relay tasks
//!
//! Per-direction forwarding between paired clients, and the watcher that
//! notices a client leaving while it is still on the waitlist.

pub mod forward;
pub mod standby;

pub use forward::relay;
pub use standby::watch_waiting;

use log::debug;

use crate::client::Client;
use crate::matchmaking::MatchmakerHandle;

/// Hand a disconnected client back to the matchmaker for teardown.
fn report_disconnect(matchmaker: &MatchmakerHandle, client: Client) {
    let id = client.id();
    if let Err(e) = matchmaker.unregister(client) {
        debug!("Could not unregister {}: {}", id, e);
    }
}
