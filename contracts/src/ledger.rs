//! # Ledger Contract
//!
//! The fungible balance sheet of the offering. Balances and total supply
//! always agree (`sum(balances) == total_supply`), and three locks govern
//! what may happen to them:
//!
//! - **Minting** ([`MintingPhase`]) — only the owner mints, and only until
//!   both the presale and the crowdsale flags are closed. During a sale the
//!   owner is the sale contract.
//! - **Transfers** ([`TransferLock`]) — before release only registered
//!   transfer agents can move balance; the release agent opens transfers
//!   for everyone, once.
//! - **Upgrade** ([`UpgradeCoordinator`]) — holders migrate balance to a
//!   registered successor after which it no longer exists here.
//!
//! ## Atomicity
//!
//! Every operation checks all of its preconditions, computes the new
//! values with checked arithmetic, and only then writes. A returned error
//! therefore always means "nothing happened". Callers that chain several
//! operations into one unit (the sale's finalisation) use
//! [`Ledger::transact`], which stages the chain on a copy and commits it
//! only if every step succeeds.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tessera_protocol::config::{DECIMALS, DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL};
use tessera_protocol::{Address, Amount, Notification};
use tracing::{debug, info};

use crate::access::{AccessRegistry, Role};
use crate::error::{ContractError, ContractResult};
use crate::phase::{MintingPhase, TransferLock};
use crate::upgrade::{UpgradeAgent, UpgradeCoordinator, UpgradeState};

/// The token ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    address: Address,
    name: String,
    symbol: String,
    total_supply: Amount,
    balances: HashMap<Address, Amount>,
    /// `owner -> (spender -> remaining allowance)`.
    allowances: HashMap<Address, HashMap<Address, Amount>>,
    access: AccessRegistry,
    minting: MintingPhase,
    transfers: TransferLock,
    upgrade: UpgradeCoordinator,
    journal: Vec<Notification>,
}

impl Ledger {
    /// Deploys an empty ledger at `address`. `controller` becomes owner,
    /// board and upgrade master.
    pub fn new(address: Address, controller: Address) -> ContractResult<Self> {
        if address.is_zero() {
            return Err(ContractError::ZeroAddress { field: "address" });
        }
        let access = AccessRegistry::new(controller)?;
        info!(%address, %controller, "ledger deployed");
        Ok(Self {
            address,
            name: DEFAULT_TOKEN_NAME.to_string(),
            symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            access,
            minting: MintingPhase::default(),
            transfers: TransferLock::default(),
            upgrade: UpgradeCoordinator::default(),
            journal: Vec::new(),
        })
    }

    /// Overrides the token name and symbol.
    pub fn with_metadata(mut self, name: &str, symbol: &str) -> Self {
        self.name = name.to_string();
        self.symbol = symbol.to_string();
        self
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> Amount {
        self.balances.get(&holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&owner)
            .and_then(|s| s.get(&spender))
            .copied()
            .unwrap_or(0)
    }

    /// Role assignments.
    pub fn access(&self) -> &AccessRegistry {
        &self.access
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn minting_phase(&self) -> MintingPhase {
        self.minting
    }

    pub fn minting_finished(&self) -> bool {
        self.minting.is_finished()
    }

    pub fn is_released(&self) -> bool {
        self.transfers.is_released()
    }

    pub fn upgrade_state(&self) -> UpgradeState {
        self.upgrade.state(self.total_supply)
    }

    pub fn upgrade_agent(&self) -> Option<Address> {
        self.upgrade.agent()
    }

    pub fn total_upgraded(&self) -> Amount {
        self.upgrade.total_upgraded()
    }

    /// `true` when holders can call [`upgrade`](Self::upgrade).
    pub fn can_upgrade(&self) -> bool {
        matches!(
            self.upgrade_state(),
            UpgradeState::ReadyToUpgrade | UpgradeState::Upgrading
        )
    }

    /// Recomputes `sum(balances) == total_supply`.
    pub fn supply_is_consistent(&self) -> bool {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            == Some(self.total_supply)
    }

    /// Notifications recorded by committed calls, oldest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.journal
    }

    /// Drains the notification journal.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.journal)
    }

    // -----------------------------------------------------------------------
    // Minting
    // -----------------------------------------------------------------------

    /// Creates `amount` new tokens for `to`. Owner only, while minting is
    /// open.
    pub fn mint(&mut self, caller: Address, to: Address, amount: Amount) -> ContractResult<()> {
        self.access.require(Role::Owner, caller)?;
        self.issue(to, amount)
    }

    /// Mint path shared with migrations into a successor ledger.
    pub(crate) fn issue(&mut self, to: Address, amount: Amount) -> ContractResult<()> {
        if self.minting.is_finished() {
            return Err(ContractError::invalid_state(
                "minting finished",
                "minting open",
            ));
        }
        if to.is_zero() {
            return Err(ContractError::ZeroAddress { field: "to" });
        }
        if amount == 0 {
            return Err(ContractError::ZeroAmount { field: "amount" });
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ContractError::Overflow("mint supply"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ContractError::Overflow("mint balance"))?;

        self.total_supply = supply;
        self.balances.insert(to, balance);
        self.journal.push(Notification::Mint { to, amount });
        self.journal.push(Notification::Transfer {
            from: Address::ZERO,
            to,
            amount,
        });
        debug!(%to, amount, supply, "minted");
        Ok(())
    }

    /// Closes the presale and/or crowdsale minting flags. Owner only.
    ///
    /// The crowdsale flag cannot close while the presale flag stays open;
    /// closing both finishes minting permanently.
    pub fn finish_minting(
        &mut self,
        caller: Address,
        close_presale: bool,
        close_crowdsale: bool,
    ) -> ContractResult<()> {
        self.access.require(Role::Owner, caller)?;
        let next = self.minting.close(close_presale, close_crowdsale)?;
        self.minting = next;
        self.journal.push(Notification::MintingClosed {
            presale_closed: next.presale_closed(),
            crowdsale_closed: next.crowdsale_closed(),
        });
        info!(ledger = %self.address, phase = %next, "minting phase closed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Assigns the release agent. Owner only, before release.
    pub fn set_release_agent(&mut self, caller: Address, agent: Address) -> ContractResult<()> {
        self.access.require(Role::Owner, caller)?;
        if self.transfers.is_released() {
            return Err(ContractError::invalid_state(
                "transfers released",
                "transfers locked",
            ));
        }
        self.access.set_release_agent(caller, agent)?;
        self.journal.push(Notification::ReleaseAgentSet { agent });
        Ok(())
    }

    /// Opens general transfers. Release agent only, once.
    pub fn release_token_transfer(&mut self, caller: Address) -> ContractResult<()> {
        self.access.require(Role::ReleaseAgent, caller)?;
        self.transfers = self.transfers.release()?;
        self.journal.push(Notification::TransfersReleased);
        info!(ledger = %self.address, "token transfers released");
        Ok(())
    }

    /// Grants or revokes pre-release transfer permission. Owner only.
    pub fn set_transfer_agent(
        &mut self,
        caller: Address,
        agent: Address,
        enabled: bool,
    ) -> ContractResult<()> {
        self.access.set_transfer_agent(caller, agent, enabled)?;
        self.journal
            .push(Notification::TransferAgentSet { agent, enabled });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Moves `amount` from the caller to `to`.
    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> ContractResult<()> {
        self.ensure_transferable(caller)?;
        self.move_balance(caller, to, amount)
    }

    /// Moves `amount` from `from` to `to`, spending the caller's allowance.
    ///
    /// Before release, `from` (the account whose balance moves) must be a
    /// transfer agent.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> ContractResult<()> {
        self.ensure_transferable(from)?;
        let allowance = self.allowance(from, caller);
        if amount > allowance {
            return Err(ContractError::InsufficientBalance {
                what: "allowance",
                available: allowance,
                requested: amount,
            });
        }
        self.move_balance(from, to, amount)?;
        self.allowances
            .entry(from)
            .or_default()
            .insert(caller, allowance - amount);
        Ok(())
    }

    /// Sets the allowance of `spender` over the caller's balance.
    pub fn approve(&mut self, caller: Address, spender: Address, amount: Amount) -> ContractResult<()> {
        if spender.is_zero() {
            return Err(ContractError::ZeroAddress { field: "spender" });
        }
        self.set_allowance(caller, spender, amount);
        Ok(())
    }

    /// Raises an allowance by `added`.
    pub fn increase_allowance(
        &mut self,
        caller: Address,
        spender: Address,
        added: Amount,
    ) -> ContractResult<()> {
        if spender.is_zero() {
            return Err(ContractError::ZeroAddress { field: "spender" });
        }
        let next = self
            .allowance(caller, spender)
            .checked_add(added)
            .ok_or(ContractError::Overflow("allowance"))?;
        self.set_allowance(caller, spender, next);
        Ok(())
    }

    /// Lowers an allowance by `subtracted`. Fails instead of clamping at zero.
    pub fn decrease_allowance(
        &mut self,
        caller: Address,
        spender: Address,
        subtracted: Amount,
    ) -> ContractResult<()> {
        if spender.is_zero() {
            return Err(ContractError::ZeroAddress { field: "spender" });
        }
        let current = self.allowance(caller, spender);
        let next = current
            .checked_sub(subtracted)
            .ok_or(ContractError::InsufficientBalance {
                what: "allowance",
                available: current,
                requested: subtracted,
            })?;
        self.set_allowance(caller, spender, next);
        Ok(())
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
        self.journal.push(Notification::Approval {
            owner,
            spender,
            amount,
        });
    }

    fn ensure_transferable(&self, sender: Address) -> ContractResult<()> {
        if self.transfers.is_released() {
            return Ok(());
        }
        self.access.require(Role::TransferAgent, sender)
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: Amount) -> ContractResult<()> {
        if from.is_zero() {
            return Err(ContractError::ZeroAddress { field: "from" });
        }
        if to.is_zero() {
            return Err(ContractError::ZeroAddress { field: "to" });
        }
        let from_balance = self.balance_of(from);
        if amount > from_balance {
            return Err(ContractError::InsufficientBalance {
                what: "balance",
                available: from_balance,
                requested: amount,
            });
        }
        if from != to {
            let to_balance = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(ContractError::Overflow("transfer balance"))?;
            self.balances.insert(from, from_balance - amount);
            self.balances.insert(to, to_balance);
        }
        self.journal
            .push(Notification::Transfer { from, to, amount });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Hands ledger ownership (and with it the right to mint) to `new_owner`.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> ContractResult<()> {
        let previous = self.access.transfer_ownership(caller, new_owner)?;
        self.journal.push(Notification::OwnershipTransferred {
            previous,
            owner: new_owner,
        });
        info!(ledger = %self.address, %previous, owner = %new_owner, "ownership transferred");
        Ok(())
    }

    /// Rotates the board address. Board only.
    pub fn change_board_address(&mut self, caller: Address, new_board: Address) -> ContractResult<()> {
        let previous = self.access.change_board(caller, new_board)?;
        self.journal.push(Notification::BoardChanged {
            previous,
            board: new_board,
        });
        Ok(())
    }

    /// Reassigns the upgrade master. Upgrade master only.
    pub fn set_upgrade_master(&mut self, caller: Address, master: Address) -> ContractResult<()> {
        self.access.set_upgrade_master(caller, master)?;
        self.journal.push(Notification::UpgradeMasterSet { master });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Upgrade
    // -----------------------------------------------------------------------

    /// Registers `agent` as the successor. Upgrade master only.
    ///
    /// Fails when supply is zero, once migration has started, or when the
    /// agent does not pass its capability check against the current supply.
    pub fn set_upgrade_agent(&mut self, caller: Address, agent: &dyn UpgradeAgent) -> ContractResult<()> {
        self.access.require(Role::UpgradeMaster, caller)?;
        let address = self.upgrade.register(self.total_supply, agent)?;
        self.journal
            .push(Notification::UpgradeAgentSet { agent: address });
        info!(ledger = %self.address, agent = %address, "upgrade agent registered");
        Ok(())
    }

    /// Migrates `amount` of the caller's balance to the successor.
    ///
    /// The successor mints first; if it refuses, nothing changes here.
    pub fn upgrade(
        &mut self,
        caller: Address,
        amount: Amount,
        agent: &mut dyn UpgradeAgent,
    ) -> ContractResult<()> {
        let pending = self
            .upgrade
            .prepare(self.total_supply, self.balance_of(caller), amount, agent)?;

        agent.upgrade_from(self.address, caller, amount)?;

        self.balances.insert(caller, pending.holder_balance);
        self.total_supply = pending.total_supply;
        self.upgrade.commit(&pending);
        self.journal.push(Notification::Upgrade {
            holder: caller,
            agent: agent.address(),
            amount,
        });
        info!(
            holder = %caller,
            amount,
            total_upgraded = pending.total_upgraded,
            "balance upgraded"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Runs `f` against a staged copy of the ledger and commits the copy
    /// only if `f` succeeds.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Ledger) -> ContractResult<T>,
    ) -> ContractResult<T> {
        let mut staged = self.clone();
        let out = f(&mut staged)?;
        *self = staged;
        Ok(out)
    }

    /// A serializable view of the ledger.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            address: self.address,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: DECIMALS,
            total_supply: self.total_supply,
            balances: self
                .balances
                .iter()
                .filter(|(_, b)| **b > 0)
                .map(|(a, b)| (*a, *b))
                .collect(),
            owner: self.access.owner(),
            board: self.access.board(),
            upgrade_master: self.access.upgrade_master(),
            release_agent: self.access.release_agent(),
            minting: self.minting,
            released: self.transfers.is_released(),
            upgrade_state: self.upgrade_state(),
            upgrade_agent: self.upgrade.agent(),
            total_upgraded: self.upgrade.total_upgraded(),
        }
    }
}

/// Point-in-time view of a [`Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Amount,
    pub balances: BTreeMap<Address, Amount>,
    pub owner: Address,
    pub board: Address,
    pub upgrade_master: Address,
    pub release_agent: Option<Address>,
    pub minting: MintingPhase,
    pub released: bool,
    pub upgrade_state: UpgradeState,
    pub upgrade_agent: Option<Address>,
    pub total_upgraded: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tessera_protocol::config::UNIT;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn ledger() -> (Ledger, Address) {
        let owner = addr("issuer");
        (Ledger::new(addr("ledger"), owner).unwrap(), owner)
    }

    #[test]
    fn new_ledger_is_empty() {
        let (l, owner) = ledger();
        assert_eq!(l.total_supply(), 0);
        assert_eq!(l.owner(), owner);
        assert_eq!(l.decimals(), 18);
        assert_eq!(l.upgrade_state(), UpgradeState::NotAllowed);
        assert!(!l.minting_finished());
        assert!(!l.is_released());
    }

    #[test]
    fn mint_credits_balance_and_supply() {
        let (mut l, owner) = ledger();
        l.mint(owner, addr("x"), 100 * UNIT).unwrap();
        assert_eq!(l.balance_of(addr("x")), 100 * UNIT);
        assert_eq!(l.total_supply(), 100 * UNIT);
        assert!(l.supply_is_consistent());
        assert_eq!(
            l.notifications(),
            &[
                Notification::Mint {
                    to: addr("x"),
                    amount: 100 * UNIT
                },
                Notification::Transfer {
                    from: Address::ZERO,
                    to: addr("x"),
                    amount: 100 * UNIT
                },
            ]
        );
    }

    #[test]
    fn mint_preconditions() {
        let (mut l, owner) = ledger();
        let err = l.mint(addr("x"), addr("x"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = l.mint(owner, Address::ZERO, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = l.mint(owner, addr("x"), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(l.notifications().is_empty());
    }

    #[test]
    fn mint_overflow_rejected_without_change() {
        let (mut l, owner) = ledger();
        l.mint(owner, addr("x"), u128::MAX).unwrap();
        let err = l.mint(owner, addr("y"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert_eq!(l.balance_of(addr("y")), 0);
        assert_eq!(l.total_supply(), u128::MAX);
    }

    #[test]
    fn release_agent_lifecycle() {
        let (mut l, owner) = ledger();
        let agent = addr("release");
        assert!(l.set_release_agent(owner, Address::ZERO).is_err());
        assert!(l.set_release_agent(agent, agent).is_err());
        assert!(l.release_token_transfer(agent).is_err());

        l.set_release_agent(owner, agent).unwrap();
        assert!(l.release_token_transfer(owner).is_err());
        l.release_token_transfer(agent).unwrap();
        assert!(l.is_released());

        // Cannot re-arm or re-release.
        assert_eq!(
            l.set_release_agent(owner, addr("other")).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert!(l.release_token_transfer(agent).is_err());
    }

    #[test]
    fn transfers_locked_until_release() {
        let (mut l, owner) = ledger();
        let holder = addr("holder");
        l.mint(owner, holder, 10).unwrap();

        let err = l.transfer(holder, addr("y"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        l.set_transfer_agent(owner, holder, true).unwrap();
        l.transfer(holder, addr("y"), 4).unwrap();
        assert_eq!(l.balance_of(addr("y")), 4);

        // y is not an agent.
        assert!(l.transfer(addr("y"), holder, 1).is_err());

        l.set_release_agent(owner, owner).unwrap();
        l.release_token_transfer(owner).unwrap();
        l.transfer(addr("y"), holder, 1).unwrap();
        assert_eq!(l.balance_of(holder), 7);
        assert!(l.supply_is_consistent());
    }

    #[test]
    fn transfer_checks_balance_and_recipient() {
        let (mut l, owner) = ledger();
        l.mint(owner, owner, 5).unwrap();
        l.set_release_agent(owner, owner).unwrap();
        l.release_token_transfer(owner).unwrap();

        assert_eq!(
            l.transfer(owner, addr("y"), 6).unwrap_err().kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            l.transfer(owner, Address::ZERO, 1).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        // Self-transfer leaves the balance alone.
        l.transfer(owner, owner, 5).unwrap();
        assert_eq!(l.balance_of(owner), 5);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let (mut l, owner) = ledger();
        let spender = addr("spender");
        l.mint(owner, owner, 100).unwrap();
        l.set_release_agent(owner, owner).unwrap();
        l.release_token_transfer(owner).unwrap();

        l.approve(owner, spender, 30).unwrap();
        assert_eq!(
            l.transfer_from(spender, owner, addr("z"), 31).unwrap_err().kind(),
            ErrorKind::InsufficientBalance
        );
        l.transfer_from(spender, owner, addr("z"), 20).unwrap();
        assert_eq!(l.allowance(owner, spender), 10);
        assert_eq!(l.balance_of(addr("z")), 20);
    }

    #[test]
    fn allowance_adjustments_do_not_clamp() {
        let (mut l, owner) = ledger();
        let spender = addr("spender");
        l.increase_allowance(owner, spender, 10).unwrap();
        l.decrease_allowance(owner, spender, 4).unwrap();
        assert_eq!(l.allowance(owner, spender), 6);
        assert!(l.decrease_allowance(owner, spender, 7).is_err());
        assert_eq!(l.allowance(owner, spender), 6);
    }

    #[test]
    fn finish_minting_blocks_mint() {
        let (mut l, owner) = ledger();
        l.mint(owner, addr("x"), 1).unwrap();
        assert!(l.finish_minting(addr("x"), true, true).is_err());
        l.finish_minting(owner, true, true).unwrap();
        assert!(l.minting_finished());
        assert_eq!(
            l.mint(owner, addr("x"), 1).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn transact_rolls_back_on_failure() {
        let (mut l, owner) = ledger();
        let result = l.transact(|staged| {
            staged.mint(owner, addr("x"), 50)?;
            staged.mint(owner, Address::ZERO, 1)
        });
        assert!(result.is_err());
        assert_eq!(l.total_supply(), 0);
        assert!(l.notifications().is_empty());

        l.transact(|staged| staged.mint(owner, addr("x"), 50)).unwrap();
        assert_eq!(l.total_supply(), 50);
    }

    #[test]
    fn snapshot_reflects_state() {
        let (mut l, owner) = ledger();
        l.mint(owner, addr("x"), 9).unwrap();
        let snap = l.snapshot();
        assert_eq!(snap.total_supply, 9);
        assert_eq!(snap.balances.get(&addr("x")), Some(&9));
        assert_eq!(snap.upgrade_state, UpgradeState::WaitingForAgent);
        assert_eq!(snap.minting, MintingPhase::Open);
    }
}
