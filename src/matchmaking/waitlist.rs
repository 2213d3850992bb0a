//! Waitlist
//!
//! FIFO queue of clients awaiting a partner.

use std::collections::VecDeque;

use crate::client::{Client, ClientId};

/// Clients waiting to be paired, oldest first.
#[derive(Debug, Default)]
pub struct Waitlist {
    queue: VecDeque<Client>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a client to the tail and returns its 1-based position.
    pub fn push_back(&mut self, client: Client) -> usize {
        self.queue.push_back(client);
        self.queue.len()
    }

    /// Removes and returns the longest-waiting client.
    pub fn pop_front(&mut self) -> Option<Client> {
        self.queue.pop_front()
    }

    /// Removes a client from anywhere in the queue, keeping the order of the rest.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let index = self.queue.iter().position(|client| client.id() == id)?;
        self.queue.remove(index)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.queue.iter().any(|client| client.id() == id)
    }

    /// Identities in pairing order.
    pub fn ids(&self) -> Vec<ClientId> {
        self.queue.iter().map(Client::id).collect()
    }

    /// Empties the queue, returning every waiting client.
    pub fn drain(&mut self) -> Vec<Client> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
