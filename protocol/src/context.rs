//! # Call Context
//!
//! The host-provided envelope around every state-changing call: who is
//! calling, how much value is attached, and what time it is. Contracts
//! authenticate purely on `caller`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::Amount;

/// Caller identity, attached value and host time for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The address that initiated the call.
    pub caller: Address,
    /// Value attached to the call, in the smallest unit.
    pub value: Amount,
    /// Host time at which the call executes.
    pub now: DateTime<Utc>,
}

impl CallContext {
    /// A call from `caller` with no attached value.
    pub fn new(caller: Address, now: DateTime<Utc>) -> Self {
        Self {
            caller,
            value: 0,
            now,
        }
    }

    /// Returns a copy of this context carrying `value`.
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}
