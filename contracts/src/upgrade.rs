//! # Upgrade Coordinator
//!
//! Moves balance from a ledger to its successor, one holder at a time.
//! The lifecycle is derived, never stored:
//!
//! ```text
//! NotAllowed ──supply > 0──▶ WaitingForAgent ──agent set──▶ ReadyToUpgrade
//!                                                               │
//!                                                  first upgrade()
//!                                                               ▼
//!                                                          Upgrading ⟲
//! ```
//!
//! The agent may be replaced while nothing has been migrated. Once
//! `total_upgraded > 0` the agent is fixed and there is no way back.
//!
//! A successor is any [`UpgradeAgent`]. Before it is registered it must
//! report `is_upgrade_agent()` and an `original_supply()` equal to the
//! migrating ledger's supply at registration time. [`SuccessorLedger`] is
//! the stock implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_protocol::{Address, Amount};
use tracing::info;

use crate::access::Role;
use crate::error::{ContractError, ContractResult};
use crate::ledger::Ledger;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a ledger is in its migration to a successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeState {
    /// Supply is zero; nothing to migrate.
    NotAllowed,
    /// Supply exists but no successor is registered.
    WaitingForAgent,
    /// A successor is registered and nothing has moved yet.
    ReadyToUpgrade,
    /// Migration in progress. Repeatable, never left.
    Upgrading,
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeState::NotAllowed => write!(f, "NotAllowed"),
            UpgradeState::WaitingForAgent => write!(f, "WaitingForAgent"),
            UpgradeState::ReadyToUpgrade => write!(f, "ReadyToUpgrade"),
            UpgradeState::Upgrading => write!(f, "Upgrading"),
        }
    }
}

/// Derives the upgrade state from the three underlying counters.
pub fn upgrade_state(
    total_supply: Amount,
    agent: Option<Address>,
    total_upgraded: Amount,
) -> UpgradeState {
    if total_upgraded > 0 {
        // Migration started; the agent is necessarily set.
        UpgradeState::Upgrading
    } else if agent.is_some() {
        UpgradeState::ReadyToUpgrade
    } else if total_supply == 0 {
        UpgradeState::NotAllowed
    } else {
        UpgradeState::WaitingForAgent
    }
}

// ---------------------------------------------------------------------------
// Successor capability
// ---------------------------------------------------------------------------

/// What a migrating ledger needs from its successor.
pub trait UpgradeAgent {
    /// Address of the successor contract.
    fn address(&self) -> Address;

    /// Must return `true` for a genuine successor.
    fn is_upgrade_agent(&self) -> bool;

    /// Supply of the predecessor the successor was built for.
    fn original_supply(&self) -> Amount;

    /// Credits `amount` to `holder` on the successor. `source` is the
    /// address of the ledger performing the migration.
    fn upgrade_from(&mut self, source: Address, holder: Address, amount: Amount)
        -> ContractResult<()>;
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Migration bookkeeping held by a [`Ledger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCoordinator {
    agent: Option<Address>,
    total_upgraded: Amount,
}

/// Pre-computed result of a validated upgrade, applied only after the
/// successor accepted the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingUpgrade {
    pub holder_balance: Amount,
    pub total_supply: Amount,
    pub total_upgraded: Amount,
}

impl UpgradeCoordinator {
    pub fn agent(&self) -> Option<Address> {
        self.agent
    }

    pub fn total_upgraded(&self) -> Amount {
        self.total_upgraded
    }

    pub fn state(&self, total_supply: Amount) -> UpgradeState {
        upgrade_state(total_supply, self.agent, self.total_upgraded)
    }

    /// Validates `candidate` against the current supply and registers it.
    /// The caller's role is checked by the ledger.
    pub(crate) fn register(
        &mut self,
        total_supply: Amount,
        candidate: &dyn UpgradeAgent,
    ) -> ContractResult<Address> {
        let address = candidate.address();
        if address.is_zero() {
            return Err(ContractError::ZeroAddress { field: "agent" });
        }
        match self.state(total_supply) {
            UpgradeState::WaitingForAgent | UpgradeState::ReadyToUpgrade => {}
            other => {
                return Err(ContractError::invalid_state(
                    other.to_string(),
                    "WaitingForAgent or ReadyToUpgrade",
                ))
            }
        }
        if !candidate.is_upgrade_agent() {
            return Err(ContractError::InvalidArgument(format!(
                "{address} is not an upgrade agent"
            )));
        }
        let original = candidate.original_supply();
        if original != total_supply {
            return Err(ContractError::InvalidArgument(format!(
                "upgrade agent expects original supply {original}, ledger supply is {total_supply}"
            )));
        }
        self.agent = Some(address);
        Ok(address)
    }

    /// Checks an upgrade of `amount` out of `balance` and computes the
    /// resulting counters without applying them.
    pub(crate) fn prepare(
        &self,
        total_supply: Amount,
        balance: Amount,
        amount: Amount,
        agent: &dyn UpgradeAgent,
    ) -> ContractResult<PendingUpgrade> {
        if amount == 0 {
            return Err(ContractError::ZeroAmount { field: "amount" });
        }
        let state = self.state(total_supply);
        if !matches!(
            state,
            UpgradeState::ReadyToUpgrade | UpgradeState::Upgrading
        ) {
            return Err(ContractError::invalid_state(
                state.to_string(),
                "ReadyToUpgrade or Upgrading",
            ));
        }
        if self.agent != Some(agent.address()) {
            return Err(ContractError::InvalidArgument(format!(
                "{} is not the registered upgrade agent",
                agent.address()
            )));
        }
        if amount > balance {
            return Err(ContractError::InsufficientBalance {
                what: "balance",
                available: balance,
                requested: amount,
            });
        }
        Ok(PendingUpgrade {
            holder_balance: balance - amount,
            total_supply: total_supply
                .checked_sub(amount)
                .ok_or(ContractError::Overflow("upgrade supply"))?,
            total_upgraded: self
                .total_upgraded
                .checked_add(amount)
                .ok_or(ContractError::Overflow("total upgraded"))?,
        })
    }

    pub(crate) fn commit(&mut self, pending: &PendingUpgrade) {
        self.total_upgraded = pending.total_upgraded;
    }
}

// ---------------------------------------------------------------------------
// SuccessorLedger
// ---------------------------------------------------------------------------

/// A fresh ledger that accepts migrated balance from one predecessor.
///
/// Migrated balance is minted through the ordinary ledger path, so the
/// successor's own minting lock still applies: a successor whose minting
/// has finished refuses migrations, and the predecessor's `upgrade` fails
/// with it.
#[derive(Debug, Clone)]
pub struct SuccessorLedger {
    ledger: Ledger,
    predecessor: Address,
    original_supply: Amount,
}

impl SuccessorLedger {
    /// Deploys a successor at `address`, controlled by `controller`, built
    /// for `predecessor` as it stands now.
    pub fn new(address: Address, controller: Address, predecessor: &Ledger) -> ContractResult<Self> {
        let ledger = Ledger::new(address, controller)?
            .with_metadata(predecessor.name(), predecessor.symbol());
        Ok(Self {
            ledger,
            predecessor: predecessor.address(),
            original_supply: predecessor.total_supply(),
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Mutable access for the successor's own lifecycle (release, agents).
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn predecessor(&self) -> Address {
        self.predecessor
    }
}

impl UpgradeAgent for SuccessorLedger {
    fn address(&self) -> Address {
        self.ledger.address()
    }

    fn is_upgrade_agent(&self) -> bool {
        true
    }

    fn original_supply(&self) -> Amount {
        self.original_supply
    }

    fn upgrade_from(
        &mut self,
        source: Address,
        holder: Address,
        amount: Amount,
    ) -> ContractResult<()> {
        if source != self.predecessor {
            return Err(ContractError::Unauthorized {
                role: Role::Predecessor,
                caller: source,
            });
        }
        self.ledger.issue(holder, amount)?;
        info!(%holder, amount, successor = %self.ledger.address(), "migrated balance received");
        Ok(())
    }
}
