//! # Purchaser Whitelist
//!
//! Whitelisted purchasers are exempt from the cumulative per-address
//! ceiling of a sale. They still respect the minimum purchase and the
//! global cap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tessera_protocol::Address;

/// Set of addresses allowed past the per-address ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    entries: BTreeSet<Address>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag for `address` and returns the resulting status.
    pub fn set(&mut self, address: Address, status: bool) -> bool {
        if status {
            self.entries.insert(address);
        } else {
            self.entries.remove(&address);
        }
        status
    }

    pub fn contains(&self, address: Address) -> bool {
        self.entries.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
