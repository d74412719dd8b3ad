//! # Sale Contract
//!
//! A time-boxed, capped offering that converts contributions into ledger
//! balance at a fixed rate. One engine serves both offering rounds; the
//! [`SalePhase`] only decides which minting flag finalisation closes.
//!
//! ## Lifecycle
//!
//! 1. **Deploy** — window, rate, bounds and the ledger/wallet addresses
//!    are fixed. The start must lie in the future.
//! 2. **Hand over** — the issuer transfers ledger ownership to the sale's
//!    address so the sale can mint.
//! 3. **Buy** — inside `[start, end)`, while not halted, contributions
//!    between the minimum and the per-address ceiling (waived for
//!    whitelisted purchasers) are accepted until the cap is reached.
//! 4. **Finalise** — after the end time or once sold out, the owner mints
//!    the issuer reserve to the wallet, closes the phase's minting flag and
//!    gets ledger ownership back. Terminal.
//!
//! Value transfers outside `buy()` are refused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tessera_protocol::config::{
    DEFAULT_CAP, DEFAULT_MAX_AMOUNT, DEFAULT_MIN_AMOUNT, DEFAULT_RATE, DEFAULT_RESERVE_TOKENS,
};
use tessera_protocol::{Address, Amount, CallContext, Notification};
use tracing::{info, warn};

use crate::access::Role;
use crate::error::{ContractError, ContractResult};
use crate::ledger::Ledger;
use crate::phase::Completion;
use crate::whitelist::Whitelist;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which offering round a sale runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalePhase {
    /// Closes the presale minting flag when finalised.
    Presale,
    /// Closes the crowdsale flag, which requires the presale flag closed.
    Crowdsale,
}

impl SalePhase {
    /// `(close_presale, close_crowdsale)` for the ledger at finalisation.
    pub fn minting_flags(self) -> (bool, bool) {
        match self {
            SalePhase::Presale => (true, false),
            SalePhase::Crowdsale => (false, true),
        }
    }
}

impl fmt::Display for SalePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SalePhase::Presale => write!(f, "presale"),
            SalePhase::Crowdsale => write!(f, "crowdsale"),
        }
    }
}

/// Deployment parameters of a sale. Immutable after deployment except for
/// the end time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
    pub phase: SalePhase,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Ledger the sale mints into.
    pub ledger: Address,
    /// Receives the contributed value and the issuer reserve.
    pub wallet: Address,
    /// Tokens per smallest unit of value.
    pub rate: Amount,
    /// Total value accepted.
    pub cap: Amount,
    /// Smallest accepted purchase.
    pub min_amount: Amount,
    /// Cumulative ceiling per non-whitelisted purchaser.
    pub max_amount: Amount,
    /// Issuer pool minted to the wallet at finalisation.
    pub reserve_tokens: Amount,
}

impl SaleConfig {
    /// A config with the protocol's default rate, cap and bounds.
    pub fn new(
        phase: SalePhase,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        ledger: Address,
        wallet: Address,
    ) -> Self {
        Self {
            phase,
            start_time,
            end_time,
            ledger,
            wallet,
            rate: DEFAULT_RATE,
            cap: DEFAULT_CAP,
            min_amount: DEFAULT_MIN_AMOUNT,
            max_amount: DEFAULT_MAX_AMOUNT,
            reserve_tokens: DEFAULT_RESERVE_TOKENS,
        }
    }

    fn validate(&self, now: DateTime<Utc>) -> ContractResult<()> {
        if self.start_time <= now {
            return Err(ContractError::InvalidArgument(
                "sale start must be in the future".into(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(ContractError::InvalidArgument(
                "sale end must be after its start".into(),
            ));
        }
        if self.ledger.is_zero() {
            return Err(ContractError::ZeroAddress { field: "ledger" });
        }
        if self.wallet.is_zero() {
            return Err(ContractError::ZeroAddress { field: "wallet" });
        }
        if self.rate == 0 {
            return Err(ContractError::ZeroAmount { field: "rate" });
        }
        if self.cap == 0 {
            return Err(ContractError::ZeroAmount { field: "cap" });
        }
        if self.min_amount > self.max_amount {
            return Err(ContractError::InvalidArgument(
                "minimum purchase exceeds the per-address maximum".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sale
// ---------------------------------------------------------------------------

/// A running (or finished) sale.
#[derive(Debug, Clone)]
pub struct Sale {
    address: Address,
    owner: Address,
    config: SaleConfig,
    wei_raised: Amount,
    sold_tokens: Amount,
    purchaser_count: u64,
    contributions: HashMap<Address, Amount>,
    whitelist: Whitelist,
    halted: bool,
    completion: Completion,
    journal: Vec<Notification>,
}

impl Sale {
    /// Deploys a sale at `address`. The caller in `ctx` becomes the owner.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidArgument`]-class errors when the
    /// start is not in the future, the end is not after the start, the
    /// ledger, wallet, deployer or sale address is zero, or the rate, cap
    /// or bounds are degenerate.
    pub fn deploy(address: Address, config: SaleConfig, ctx: &CallContext) -> ContractResult<Self> {
        if address.is_zero() {
            return Err(ContractError::ZeroAddress { field: "address" });
        }
        if ctx.caller.is_zero() {
            return Err(ContractError::ZeroAddress { field: "deployer" });
        }
        config.validate(ctx.now)?;
        info!(
            %address,
            phase = %config.phase,
            start = %config.start_time,
            end = %config.end_time,
            cap = config.cap,
            "sale deployed"
        );
        Ok(Self {
            address,
            owner: ctx.caller,
            config,
            wei_raised: 0,
            sold_tokens: 0,
            purchaser_count: 0,
            contributions: HashMap::new(),
            whitelist: Whitelist::new(),
            halted: false,
            completion: Completion::default(),
            journal: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.config.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.config.end_time
    }

    pub fn wei_raised(&self) -> Amount {
        self.wei_raised
    }

    pub fn sold_tokens(&self) -> Amount {
        self.sold_tokens
    }

    pub fn purchaser_count(&self) -> u64 {
        self.purchaser_count
    }

    /// Total value `purchaser` has contributed.
    pub fn contribution_of(&self, purchaser: Address) -> Amount {
        self.contributions.get(&purchaser).copied().unwrap_or(0)
    }

    pub fn is_whitelisted(&self, address: Address) -> bool {
        self.whitelist.contains(address)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.config.start_time
    }

    /// `true` once the end time has passed or the cap is reached.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.config.end_time || self.wei_raised >= self.config.cap
    }

    /// `true` when a purchase could currently be accepted.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.has_started(now) && !self.has_ended(now) && !self.halted && !self.is_completed()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.journal
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.journal)
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    fn require_owner(&self, caller: Address) -> ContractResult<()> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(ContractError::Unauthorized {
                role: Role::Owner,
                caller,
            })
        }
    }

    /// Sets or clears the whitelist flag of `address`. Owner only.
    pub fn update_whitelist(
        &mut self,
        ctx: &CallContext,
        address: Address,
        status: bool,
    ) -> ContractResult<()> {
        self.require_owner(ctx.caller)?;
        if address.is_zero() {
            return Err(ContractError::ZeroAddress { field: "address" });
        }
        let status = self.whitelist.set(address, status);
        self.journal
            .push(Notification::WhitelistUpdated { address, status });
        Ok(())
    }

    /// Stops accepting purchases. Fails if already halted.
    pub fn halt(&mut self, ctx: &CallContext) -> ContractResult<()> {
        self.require_owner(ctx.caller)?;
        if self.halted {
            return Err(ContractError::invalid_state("halted", "running"));
        }
        self.halted = true;
        self.journal.push(Notification::Halted);
        warn!(sale = %self.address, "sale halted");
        Ok(())
    }

    /// Resumes purchases. Fails if not halted.
    pub fn unhalt(&mut self, ctx: &CallContext) -> ContractResult<()> {
        self.require_owner(ctx.caller)?;
        if !self.halted {
            return Err(ContractError::invalid_state("running", "halted"));
        }
        self.halted = false;
        self.journal.push(Notification::Unhalted);
        info!(sale = %self.address, "sale resumed");
        Ok(())
    }

    /// Moves the end time. Owner only.
    ///
    /// The new end must lie after the start. Once the sale is live it may
    /// be at or before the current time, which ends the sale immediately.
    pub fn change_end_time(&mut self, ctx: &CallContext, new_end: DateTime<Utc>) -> ContractResult<()> {
        self.require_owner(ctx.caller)?;
        if self.is_completed() {
            return Err(ContractError::invalid_state(
                "sale finalised",
                "sale not finalised",
            ));
        }
        if new_end <= self.config.start_time {
            return Err(ContractError::InvalidArgument(format!(
                "end time {new_end} is not after start time {}",
                self.config.start_time
            )));
        }
        self.config.end_time = new_end;
        self.journal
            .push(Notification::EndTimeChanged { end_time: new_end });
        info!(sale = %self.address, end = %new_end, ended = self.has_ended(ctx.now), "end time changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Purchases
    // -----------------------------------------------------------------------

    /// Accepts the value attached to `ctx` and mints `value * rate` tokens
    /// to the caller. Returns the number of tokens minted.
    pub fn buy(&mut self, ledger: &mut Ledger, ctx: &CallContext) -> ContractResult<Amount> {
        let purchaser = ctx.caller;
        let value = ctx.value;

        if purchaser.is_zero() {
            return Err(ContractError::ZeroAddress { field: "purchaser" });
        }
        self.ensure_ledger(ledger)?;
        if self.is_completed() {
            return Err(ContractError::invalid_state("sale finalised", "sale live"));
        }
        if self.halted {
            return Err(ContractError::invalid_state("halted", "running"));
        }
        if ctx.now < self.config.start_time {
            return Err(ContractError::invalid_state(
                "sale not started",
                "inside the sale window",
            ));
        }
        if ctx.now >= self.config.end_time {
            return Err(ContractError::invalid_state(
                "sale ended",
                "inside the sale window",
            ));
        }
        if value == 0 {
            return Err(ContractError::ZeroAmount { field: "value" });
        }
        if value < self.config.min_amount {
            return Err(ContractError::LimitExceeded {
                limit: "minimum purchase",
                allowed: self.config.min_amount,
                attempted: value,
            });
        }

        let previous = self.contribution_of(purchaser);
        let contributed = previous
            .checked_add(value)
            .ok_or(ContractError::Overflow("contribution"))?;
        if !self.whitelist.contains(purchaser) && contributed > self.config.max_amount {
            return Err(ContractError::LimitExceeded {
                limit: "per-address maximum",
                allowed: self.config.max_amount,
                attempted: contributed,
            });
        }
        let raised = self
            .wei_raised
            .checked_add(value)
            .ok_or(ContractError::Overflow("wei raised"))?;
        if raised > self.config.cap {
            return Err(ContractError::LimitExceeded {
                limit: "cap",
                allowed: self.config.cap,
                attempted: raised,
            });
        }
        let tokens = value
            .checked_mul(self.config.rate)
            .ok_or(ContractError::Overflow("token amount"))?;
        let sold = self
            .sold_tokens
            .checked_add(tokens)
            .ok_or(ContractError::Overflow("sold tokens"))?;

        ledger.mint(self.address, purchaser, tokens)?;

        self.wei_raised = raised;
        self.sold_tokens = sold;
        self.contributions.insert(purchaser, contributed);
        if previous == 0 {
            self.purchaser_count += 1;
        }
        self.journal.push(Notification::TokenPurchase {
            purchaser,
            value,
            amount: tokens,
        });
        info!(
            sale = %self.address,
            %purchaser,
            value,
            tokens,
            wei_raised = raised,
            "purchase accepted"
        );
        Ok(tokens)
    }

    /// Value sent to the sale outside `buy()`. Always refused.
    pub fn receive(&self, ctx: &CallContext) -> ContractResult<()> {
        warn!(sale = %self.address, from = %ctx.caller, value = ctx.value, "direct transfer refused");
        Err(ContractError::invalid_state(
            "direct value transfer",
            "a buy() call",
        ))
    }

    // -----------------------------------------------------------------------
    // Finalisation
    // -----------------------------------------------------------------------

    /// Completes the sale. Owner only, once, after [`has_ended`](Self::has_ended).
    ///
    /// In one ledger transaction: mints the reserve to the wallet, closes
    /// this phase's minting flag and returns ledger ownership to the sale
    /// owner. If any step fails neither contract changes.
    pub fn finalise(&mut self, ledger: &mut Ledger, ctx: &CallContext) -> ContractResult<()> {
        self.require_owner(ctx.caller)?;
        self.ensure_ledger(ledger)?;
        if !self.has_ended(ctx.now) {
            return Err(ContractError::invalid_state("sale running", "sale ended"));
        }
        let completion = self.completion.complete()?;

        let sale = self.address;
        let owner = self.owner;
        let wallet = self.config.wallet;
        let reserve = self.config.reserve_tokens;
        let (close_presale, close_crowdsale) = self.config.phase.minting_flags();

        ledger.transact(|l| {
            if reserve > 0 {
                l.mint(sale, wallet, reserve)?;
            }
            l.finish_minting(sale, close_presale, close_crowdsale)?;
            l.transfer_ownership(sale, owner)
        })?;

        self.completion = completion;
        self.journal
            .push(Notification::Finalised { wallet, reserve });
        info!(
            sale = %self.address,
            phase = %self.config.phase,
            wei_raised = self.wei_raised,
            sold_tokens = self.sold_tokens,
            reserve,
            "sale finalised"
        );
        Ok(())
    }

    fn ensure_ledger(&self, ledger: &Ledger) -> ContractResult<()> {
        if ledger.address() != self.config.ledger {
            return Err(ContractError::InvalidArgument(format!(
                "ledger {} is not the sale's ledger {}",
                ledger.address(),
                self.config.ledger
            )));
        }
        Ok(())
    }

    /// A serializable view of the sale.
    pub fn snapshot(&self, now: DateTime<Utc>) -> SaleSnapshot {
        SaleSnapshot {
            address: self.address,
            owner: self.owner,
            config: self.config.clone(),
            wei_raised: self.wei_raised,
            sold_tokens: self.sold_tokens,
            purchaser_count: self.purchaser_count,
            whitelisted: self.whitelist.len(),
            halted: self.halted,
            completed: self.is_completed(),
            has_ended: self.has_ended(now),
        }
    }
}

/// Point-in-time view of a [`Sale`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleSnapshot {
    pub address: Address,
    pub owner: Address,
    pub config: SaleConfig,
    pub wei_raised: Amount,
    pub sold_tokens: Amount,
    pub purchaser_count: u64,
    pub whitelisted: usize,
    pub halted: bool,
    pub completed: bool,
    pub has_ended: bool,
}
