//! Pair registry
//!
//! Symmetric mapping from each paired client to its partner.

use log::error;
use std::collections::HashMap;

use crate::client::{Client, ClientId};

/// Registry of active pairings.
///
/// Every pairing is stored as two entries, `a -> b` and `b -> a`, which are
/// always inserted and removed together.
#[derive(Debug, Default)]
pub struct PairRegistry {
    partners: HashMap<ClientId, Client>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the symmetric pair `{a, b}`.
    ///
    /// Callers must ensure neither client is already paired.
    pub fn pair(&mut self, a: Client, b: Client) {
        debug_assert_ne!(a.id(), b.id(), "a client cannot be paired with itself");
        debug_assert!(!self.contains(a.id()) && !self.contains(b.id()));

        self.partners.insert(a.id(), b.clone());
        self.partners.insert(b.id(), a);
    }

    /// Removes both entries of the pairing containing `id`, returning the partner.
    pub fn unpair(&mut self, id: ClientId) -> Option<Client> {
        let partner = self.partners.remove(&id)?;
        if self.partners.remove(&partner.id()).is_none() {
            error!("Pair registry was asymmetric: {} had no entry for {}", partner.id(), id);
        }
        Some(partner)
    }

    pub fn partner_of(&self, id: ClientId) -> Option<&Client> {
        self.partners.get(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.partners.contains_key(&id)
    }

    /// Each pairing once, lower id first, sorted.
    pub fn pairs(&self) -> Vec<(ClientId, ClientId)> {
        let mut pairs: Vec<_> = self
            .partners
            .iter()
            .filter(|(id, partner)| **id < partner.id())
            .map(|(id, partner)| (*id, partner.id()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Empties the registry, returning every paired client once.
    pub fn drain(&mut self) -> Vec<Client> {
        self.partners.drain().map(|(_, client)| client).collect()
    }

    /// Number of active pairings.
    pub fn len(&self) -> usize {
        self.partners.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}
