//! # Access Registry
//!
//! The privileged identities of a ledger, held as one explicit value
//! instead of loose fields so authorization can be tested on its own:
//!
//! - **owner** — may mint, close minting phases, configure release and
//!   transfer agents, and hand ownership over. During a sale the owner is
//!   the sale contract itself.
//! - **board** — a self-administered address. Only the current board may
//!   rotate it, never to zero and never to itself.
//! - **upgrade master** — registers the successor ledger; reassignable only
//!   by the current holder.
//! - **release agent** — the one address allowed to open general transfers.
//! - **transfer agents** — addresses allowed to move balance before the
//!   release.
//!
//! Every mutating method validates completely before it writes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tessera_protocol::Address;
use tracing::debug;

use crate::error::{ContractError, ContractResult};

/// A privileged role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Board,
    UpgradeMaster,
    ReleaseAgent,
    TransferAgent,
    /// The ledger a successor accepts migrations from. Checked by the
    /// successor itself, never held in a registry.
    Predecessor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Board => write!(f, "board"),
            Role::UpgradeMaster => write!(f, "upgrade master"),
            Role::ReleaseAgent => write!(f, "release agent"),
            Role::TransferAgent => write!(f, "transfer agent"),
            Role::Predecessor => write!(f, "predecessor ledger"),
        }
    }
}

/// Role assignments for one ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRegistry {
    owner: Address,
    board: Address,
    upgrade_master: Address,
    release_agent: Option<Address>,
    transfer_agents: BTreeSet<Address>,
}

impl AccessRegistry {
    /// Creates a registry where `controller` is owner, board and upgrade
    /// master. No release agent and no transfer agents are set.
    pub fn new(controller: Address) -> ContractResult<Self> {
        if controller.is_zero() {
            return Err(ContractError::ZeroAddress { field: "controller" });
        }
        Ok(Self {
            owner: controller,
            board: controller,
            upgrade_master: controller,
            release_agent: None,
            transfer_agents: BTreeSet::new(),
        })
    }

    /// Fails with [`ContractError::Unauthorized`] unless `caller` holds `role`.
    pub fn require(&self, role: Role, caller: Address) -> ContractResult<()> {
        let allowed = match role {
            Role::Owner => caller == self.owner,
            Role::Board => caller == self.board,
            Role::UpgradeMaster => caller == self.upgrade_master,
            Role::ReleaseAgent => self.release_agent == Some(caller),
            Role::TransferAgent => self.transfer_agents.contains(&caller),
            Role::Predecessor => false,
        };
        if allowed {
            Ok(())
        } else {
            debug!(%role, %caller, "role check failed");
            Err(ContractError::Unauthorized { role, caller })
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn board(&self) -> Address {
        self.board
    }

    pub fn upgrade_master(&self) -> Address {
        self.upgrade_master
    }

    pub fn release_agent(&self) -> Option<Address> {
        self.release_agent
    }

    pub fn is_transfer_agent(&self, address: Address) -> bool {
        self.transfer_agents.contains(&address)
    }

    /// Hands ownership to `new_owner`. Returns the previous owner.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> ContractResult<Address> {
        self.require(Role::Owner, caller)?;
        if new_owner.is_zero() {
            return Err(ContractError::ZeroAddress { field: "new_owner" });
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(previous)
    }

    /// Rotates the board address. Returns the previous board.
    pub fn change_board(&mut self, caller: Address, new_board: Address) -> ContractResult<Address> {
        self.require(Role::Board, caller)?;
        if new_board.is_zero() {
            return Err(ContractError::ZeroAddress { field: "new_board" });
        }
        if new_board == self.board {
            return Err(ContractError::InvalidArgument(
                "new board must differ from the current board".into(),
            ));
        }
        Ok(std::mem::replace(&mut self.board, new_board))
    }

    /// Reassigns the upgrade master.
    pub fn set_upgrade_master(&mut self, caller: Address, master: Address) -> ContractResult<()> {
        self.require(Role::UpgradeMaster, caller)?;
        if master.is_zero() {
            return Err(ContractError::ZeroAddress { field: "master" });
        }
        self.upgrade_master = master;
        Ok(())
    }

    /// Assigns the release agent. The ledger checks the release phase
    /// before delegating here.
    pub fn set_release_agent(&mut self, caller: Address, agent: Address) -> ContractResult<()> {
        self.require(Role::Owner, caller)?;
        if agent.is_zero() {
            return Err(ContractError::ZeroAddress { field: "agent" });
        }
        self.release_agent = Some(agent);
        Ok(())
    }

    /// Grants or revokes pre-release transfer permission.
    pub fn set_transfer_agent(
        &mut self,
        caller: Address,
        agent: Address,
        enabled: bool,
    ) -> ContractResult<()> {
        self.require(Role::Owner, caller)?;
        if agent.is_zero() {
            return Err(ContractError::ZeroAddress { field: "agent" });
        }
        if enabled {
            self.transfer_agents.insert(agent);
        } else {
            self.transfer_agents.remove(&agent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (AccessRegistry, Address) {
        let owner = Address::from_label("issuer");
        (AccessRegistry::new(owner).unwrap(), owner)
    }

    #[test]
    fn controller_holds_owner_board_and_master() {
        let (reg, owner) = registry();
        assert!(reg.require(Role::Owner, owner).is_ok());
        assert!(reg.require(Role::Board, owner).is_ok());
        assert!(reg.require(Role::UpgradeMaster, owner).is_ok());
        assert!(reg.require(Role::ReleaseAgent, owner).is_err());
        assert!(reg.require(Role::TransferAgent, owner).is_err());
    }

    #[test]
    fn zero_controller_rejected() {
        assert!(AccessRegistry::new(Address::ZERO).is_err());
    }

    #[test]
    fn board_rotation_rules() {
        let (mut reg, owner) = registry();
        let next = Address::from_label("board-2");

        // Not the board.
        assert!(reg.change_board(next, next).is_err());
        // Zero and self-assignment.
        assert!(reg.change_board(owner, Address::ZERO).is_err());
        assert!(reg.change_board(owner, owner).is_err());

        assert_eq!(reg.change_board(owner, next).unwrap(), owner);
        assert_eq!(reg.board(), next);
        // The old board lost the role.
        assert!(reg.change_board(owner, Address::from_label("x")).is_err());
    }

    #[test]
    fn upgrade_master_reassigned_only_by_holder() {
        let (mut reg, owner) = registry();
        let other = Address::from_label("other");
        assert!(reg.set_upgrade_master(other, other).is_err());
        assert!(reg.set_upgrade_master(owner, Address::ZERO).is_err());
        reg.set_upgrade_master(owner, other).unwrap();
        assert_eq!(reg.upgrade_master(), other);
        assert!(reg.set_upgrade_master(owner, owner).is_err());
    }

    #[test]
    fn transfer_agent_toggle() {
        let (mut reg, owner) = registry();
        let agent = Address::from_label("agent");
        reg.set_transfer_agent(owner, agent, true).unwrap();
        assert!(reg.is_transfer_agent(agent));
        reg.set_transfer_agent(owner, agent, false).unwrap();
        assert!(!reg.is_transfer_agent(agent));
        assert!(reg.set_transfer_agent(agent, agent, true).is_err());
    }

    #[test]
    fn ownership_transfer_moves_the_role() {
        let (mut reg, owner) = registry();
        let sale = Address::from_label("sale");
        assert_eq!(reg.transfer_ownership(owner, sale).unwrap(), owner);
        assert!(reg.require(Role::Owner, owner).is_err());
        assert!(reg.require(Role::Owner, sale).is_ok());
    }
}
