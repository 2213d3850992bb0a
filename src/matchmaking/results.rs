//! Matchmaking result types
//!
//! Defines result structures returned by matchmaking operations.

use crate::client::{Client, ClientId};

/// Result of registering a client
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// No partner was available; the client is queued at `position` (1-based).
    Waiting { position: usize },
    /// The client was paired with the longest-waiting client.
    Paired { partner: Client },
    /// The client was already waiting or paired; nothing changed.
    AlreadyRegistered,
}

/// Result of unregistering a client
#[derive(Debug, Clone)]
pub enum UnregisterOutcome {
    /// The client was still waiting and has been dequeued.
    LeftWaitlist,
    /// The client's pairing has been removed; `partner` must be notified and closed.
    Unpaired { partner: Client },
    /// The client was not known (already torn down, or never registered).
    Unknown,
}

/// Point-in-time view of the matchmaking state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchmakingSnapshot {
    /// Waiting clients, oldest first
    pub waiting: Vec<ClientId>,
    /// Active pairings, lower id first
    pub pairs: Vec<(ClientId, ClientId)>,
}

impl MatchmakingSnapshot {
    pub fn is_waiting(&self, id: ClientId) -> bool {
        self.waiting.contains(&id)
    }

    pub fn partner_of(&self, id: ClientId) -> Option<ClientId> {
        self.pairs.iter().find_map(|&(a, b)| {
            if a == id {
                Some(b)
            } else if b == id {
                Some(a)
            } else {
                None
            }
        })
    }

    pub fn is_paired(&self, id: ClientId) -> bool {
        self.partner_of(id).is_some()
    }

    /// Neither waiting nor paired.
    pub fn is_absent(&self, id: ClientId) -> bool {
        !self.is_waiting(id) && !self.is_paired(id)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}
