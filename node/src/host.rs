//! # Replay Host
//!
//! Plays the role of the transaction sequencer: it owns every deployed
//! contract, applies scenario calls strictly one after another against a
//! [`ManualClock`], and turns each outcome into a [`Receipt`].
//!
//! A rejected call is a normal outcome, not a host error. The contracts
//! guarantee a rejected call changed nothing, so the host simply records
//! the error kind and moves on.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tessera_contracts::{
    ContractError, ContractResult, ErrorKind, Ledger, LedgerSnapshot, Sale, SaleConfig,
    SaleSnapshot, SuccessorLedger,
};
use tessera_protocol::{Address, CallContext, Clock, ManualClock, Notification, SystemClock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::OfferingMetrics;
use crate::scenario::{Action, Call, SaleSetup, Scenario};

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Outcome of one replayed call.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub id: Uuid,
    /// Position in the scenario, starting at 1.
    pub index: usize,
    pub at: DateTime<Utc>,
    pub caller: Address,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `false` when the call carried an expectation that did not hold.
    pub as_expected: bool,
    pub notifications: Vec<Notification>,
}

impl Receipt {
    pub fn outcome(&self) -> Result<(), ErrorKind> {
        match self.error {
            Some(kind) => Err(kind),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.error {
            None => "ok".to_string(),
            Some(kind) => kind.to_string(),
        };
        let flag = if self.as_expected { "" } else { "  !! unexpected" };
        write!(
            f,
            "#{:<3} {} {:<14} {:?} {}{}",
            self.index,
            self.at.format("%Y-%m-%dT%H:%M:%SZ"),
            status,
            self.caller,
            self.op,
            flag
        )?;
        if let Some(message) = &self.message {
            write!(f, "\n       {message}")?;
        }
        for n in &self.notifications {
            write!(f, "\n       - {n}")?;
        }
        Ok(())
    }
}

/// Final state of every contract after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ledger: LedgerSnapshot,
    pub sales: Vec<SaleSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successor: Option<LedgerSnapshot>,
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Owns the deployed contracts of one scenario.
pub struct Host {
    clock: ManualClock,
    ledger: Ledger,
    sales: BTreeMap<Address, Sale>,
    successor: Option<SuccessorLedger>,
    metrics: OfferingMetrics,
    executed: usize,
}

impl Host {
    /// Deploys the scenario's ledger at the scenario's start time, or at
    /// the current wall-clock time when the scenario does not pin one.
    pub fn new(scenario: &Scenario, metrics: OfferingMetrics) -> ContractResult<Self> {
        let setup = &scenario.ledger;
        let start = scenario.start_time.unwrap_or_else(|| SystemClock.now());
        let ledger = Ledger::new(setup.address, setup.issuer)?
            .with_metadata(&setup.name, &setup.symbol);
        info!(
            ledger = %setup.address,
            issuer = %setup.issuer,
            start = %start,
            "ledger deployed"
        );
        let host = Self {
            clock: ManualClock::new(start),
            ledger,
            sales: BTreeMap::new(),
            successor: None,
            metrics,
            executed: 0,
        };
        host.metrics.observe(&host.ledger, host.sales.values());
        Ok(host)
    }

    #[allow(dead_code)]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[allow(dead_code)]
    pub fn sale(&self, address: Address) -> Option<&Sale> {
        self.sales.get(&address)
    }

    #[allow(dead_code)]
    pub fn successor(&self) -> Option<&SuccessorLedger> {
        self.successor.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn metrics(&self) -> &OfferingMetrics {
        &self.metrics
    }

    /// Applies every call in order.
    pub fn run(&mut self, calls: &[Call]) -> Vec<Receipt> {
        calls.iter().map(|call| self.execute(call)).collect()
    }

    /// Applies one call and returns its receipt.
    pub fn execute(&mut self, call: &Call) -> Receipt {
        self.executed += 1;
        let advanced = self.advance_clock(call.advance_secs);
        let value = call.value.map(|v| v.0).unwrap_or(0);
        let ctx = CallContext::new(call.caller, self.clock.now()).with_value(value);

        let result = advanced.and_then(|()| self.apply(&ctx, &call.action));
        let outcome = result.as_ref().map(|_| ()).map_err(ContractError::kind);
        let as_expected = call.expectation_met(outcome);

        match &result {
            Ok(()) => debug!(index = self.executed, op = call.action.name(), "call committed"),
            Err(e) => debug!(index = self.executed, op = call.action.name(), error = %e, "call rejected"),
        }
        if !as_expected {
            warn!(
                index = self.executed,
                op = call.action.name(),
                expected = call.expect.as_deref().unwrap_or_default(),
                "call outcome differs from expectation"
            );
        }

        self.metrics.record_call(outcome);
        self.metrics.observe(&self.ledger, self.sales.values());

        Receipt {
            id: Uuid::new_v4(),
            index: self.executed,
            at: ctx.now,
            caller: ctx.caller,
            op: call.action.name(),
            ok: result.is_ok(),
            error: outcome.err(),
            message: result.err().map(|e| e.to_string()),
            as_expected,
            notifications: self.drain_notifications(),
        }
    }

    /// A step the clock cannot represent rejects the call and leaves the
    /// clock where it was.
    fn advance_clock(&self, secs: i64) -> ContractResult<()> {
        Duration::try_seconds(secs)
            .and_then(|by| self.clock.advance(by))
            .map(|_| ())
            .ok_or_else(|| {
                ContractError::InvalidArgument(format!(
                    "cannot advance the clock by {secs} seconds"
                ))
            })
    }

    fn apply(&mut self, ctx: &CallContext, action: &Action) -> ContractResult<()> {
        let caller = ctx.caller;
        match action {
            Action::Mint { to, amount } => self.ledger.mint(caller, *to, amount.0),
            Action::FinishMinting { presale, crowdsale } => {
                self.ledger.finish_minting(caller, *presale, *crowdsale)
            }
            Action::SetReleaseAgent { agent } => self.ledger.set_release_agent(caller, *agent),
            Action::ReleaseTokenTransfer => self.ledger.release_token_transfer(caller),
            Action::SetTransferAgent { agent, enabled } => {
                self.ledger.set_transfer_agent(caller, *agent, *enabled)
            }
            Action::Transfer { to, amount } => self.ledger.transfer(caller, *to, amount.0),
            Action::TransferFrom { from, to, amount } => {
                self.ledger.transfer_from(caller, *from, *to, amount.0)
            }
            Action::Approve { spender, amount } => self.ledger.approve(caller, *spender, amount.0),
            Action::IncreaseAllowance { spender, amount } => {
                self.ledger.increase_allowance(caller, *spender, amount.0)
            }
            Action::DecreaseAllowance { spender, amount } => {
                self.ledger.decrease_allowance(caller, *spender, amount.0)
            }
            Action::TransferOwnership { new_owner } => {
                self.ledger.transfer_ownership(caller, *new_owner)
            }
            Action::ChangeBoard { board } => self.ledger.change_board_address(caller, *board),
            Action::SetUpgradeMaster { master } => self.ledger.set_upgrade_master(caller, *master),

            Action::DeploySuccessor { address } => {
                if self.successor.is_some() {
                    return Err(ContractError::InvalidArgument(
                        "a successor ledger is already deployed".into(),
                    ));
                }
                let successor = SuccessorLedger::new(*address, caller, &self.ledger)?;
                info!(successor = %address, original_supply = self.ledger.total_supply(), "successor deployed");
                self.successor = Some(successor);
                Ok(())
            }
            Action::SetUpgradeAgent => {
                let successor = self.successor.as_ref().ok_or_else(no_successor)?;
                self.ledger.set_upgrade_agent(caller, successor)
            }
            Action::Upgrade { amount } => {
                let successor = self.successor.as_mut().ok_or_else(no_successor)?;
                self.ledger.upgrade(caller, amount.0, successor)
            }

            Action::DeploySale(setup) => {
                if self.sales.contains_key(&setup.address) {
                    return Err(ContractError::InvalidArgument(format!(
                        "a sale is already deployed at {}",
                        setup.address
                    )));
                }
                let config = sale_config(setup, self.ledger.address(), ctx.now)?;
                let sale = Sale::deploy(setup.address, config, ctx)?;
                self.sales.insert(setup.address, sale);
                Ok(())
            }
            Action::Buy { sale } => sale_mut(&mut self.sales, *sale)?
                .buy(&mut self.ledger, ctx)
                .map(|_| ()),
            Action::Send { sale } => sale_mut(&mut self.sales, *sale)?.receive(ctx),
            Action::Halt { sale } => sale_mut(&mut self.sales, *sale)?.halt(ctx),
            Action::Unhalt { sale } => sale_mut(&mut self.sales, *sale)?.unhalt(ctx),
            Action::ChangeEndTime { sale, end_time } => {
                sale_mut(&mut self.sales, *sale)?.change_end_time(ctx, *end_time)
            }
            Action::UpdateWhitelist {
                sale,
                address,
                status,
            } => sale_mut(&mut self.sales, *sale)?.update_whitelist(ctx, *address, *status),
            Action::Finalise { sale } => {
                sale_mut(&mut self.sales, *sale)?.finalise(&mut self.ledger, ctx)
            }
        }
    }

    fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = self.ledger.take_notifications();
        for sale in self.sales.values_mut() {
            out.extend(sale.take_notifications());
        }
        if let Some(successor) = self.successor.as_mut() {
            out.extend(successor.ledger_mut().take_notifications());
        }
        out
    }

    /// Snapshots every contract at the current host time.
    pub fn summary(&self) -> Summary {
        let now = self.clock.now();
        Summary {
            ledger: self.ledger.snapshot(),
            sales: self.sales.values().map(|s| s.snapshot(now)).collect(),
            successor: self.successor.as_ref().map(|s| s.ledger().snapshot()),
        }
    }
}

fn sale_mut(sales: &mut BTreeMap<Address, Sale>, address: Address) -> ContractResult<&mut Sale> {
    sales
        .get_mut(&address)
        .ok_or_else(|| ContractError::InvalidArgument(format!("no sale deployed at {address}")))
}

fn no_successor() -> ContractError {
    ContractError::InvalidArgument("no successor ledger deployed".into())
}

fn sale_config(
    setup: &SaleSetup,
    ledger: Address,
    now: DateTime<Utc>,
) -> ContractResult<SaleConfig> {
    let offset = |from: DateTime<Utc>, secs: i64| {
        Duration::try_seconds(secs)
            .and_then(|by| from.checked_add_signed(by))
            .ok_or_else(|| {
                ContractError::InvalidArgument(format!("sale window offset {secs}s is out of range"))
            })
    };
    let start = offset(now, setup.starts_in_secs)?;
    let end = offset(start, setup.duration_secs)?;
    let mut config = SaleConfig::new(setup.phase, start, end, ledger, setup.wallet);
    if let Some(rate) = setup.rate {
        config.rate = u128::from(rate);
    }
    if let Some(cap) = setup.cap {
        config.cap = cap.0;
    }
    if let Some(min) = setup.min_amount {
        config.min_amount = min.0;
    }
    if let Some(max) = setup.max_amount {
        config.max_amount = max.0;
    }
    if let Some(reserve) = setup.reserve_tokens {
        config.reserve_tokens = reserve.0;
    }
    Ok(config)
}
