//! Matchmaking operations
//!
//! The pairing policy as pure state transitions over the waitlist and pair
//! registry. No I/O happens here; the matchmaker acts on the returned outcomes.

use crate::client::{Client, ClientId};
use crate::matchmaking::registry::PairRegistry;
use crate::matchmaking::results::{MatchmakingSnapshot, RegisterOutcome, UnregisterOutcome};
use crate::matchmaking::waitlist::Waitlist;

/// Waitlist and pair registry, mutated only through `register` and `unregister`.
#[derive(Debug, Default)]
pub struct MatchmakingState {
    waitlist: Waitlist,
    registry: PairRegistry,
}

impl MatchmakingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs `client` with the longest-waiting client, or queues it.
    pub fn register(&mut self, client: Client) -> RegisterOutcome {
        if self.is_known(client.id()) {
            return RegisterOutcome::AlreadyRegistered;
        }

        match self.waitlist.pop_front() {
            Some(partner) => {
                self.registry.pair(client, partner.clone());
                RegisterOutcome::Paired { partner }
            }
            None => {
                let position = self.waitlist.push_back(client);
                RegisterOutcome::Waiting { position }
            }
        }
    }

    /// Removes `client` from the waitlist and from its pairing, if any.
    ///
    /// Safe to call any number of times for the same client.
    pub fn unregister(&mut self, client: &Client) -> UnregisterOutcome {
        let was_waiting = self.waitlist.remove(client.id()).is_some();

        match self.registry.unpair(client.id()) {
            Some(partner) => UnregisterOutcome::Unpaired { partner },
            None if was_waiting => UnregisterOutcome::LeftWaitlist,
            None => UnregisterOutcome::Unknown,
        }
    }

    /// Whether the client is currently waiting or paired.
    pub fn is_known(&self, id: ClientId) -> bool {
        self.waitlist.contains(id) || self.registry.contains(id)
    }

    pub fn snapshot(&self) -> MatchmakingSnapshot {
        MatchmakingSnapshot {
            waiting: self.waitlist.ids(),
            pairs: self.registry.pairs(),
        }
    }

    /// Removes every client from both structures and returns them.
    pub fn drain(&mut self) -> Vec<Client> {
        let mut clients = self.waitlist.drain();
        clients.extend(self.registry.drain());
        clients
    }
}
