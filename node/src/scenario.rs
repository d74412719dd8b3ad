//! # Scenario Files
//!
//! A scenario is a JSON document describing one offering: the ledger to
//! deploy, the instant the replay starts at (the wall clock if omitted),
//! and the ordered list of calls to apply. Addresses may be written as
//! `0x` hex or as labels (`"alice"`) which derive a stable address. Amounts are decimal strings in whole
//! units (`"0.5"`, `"1000"`), converted to the smallest denomination.
//!
//! ```json
//! {
//!   "start_time": "2026-01-01T00:00:00Z",
//!   "ledger": { "address": "ledger", "issuer": "issuer" },
//!   "calls": [
//!     { "caller": "issuer", "op": "deploy_sale", "address": "presale",
//!       "phase": "presale", "wallet": "wallet" },
//!     { "caller": "alice", "advance_secs": 86400, "op": "buy",
//!       "sale": "presale", "value": "1", "expect": "ok" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use tessera_contracts::{ErrorKind, SalePhase};
use tessera_protocol::config::{
    format_amount, parse_amount, DEFAULT_SALE_DURATION_SECS, DEFAULT_START_DELAY_SECS,
    DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL,
};
use tessera_protocol::{Address, Amount};

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// An amount written as a decimal string of whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Units(pub Amount);

impl Serialize for Units {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_amount(self.0))
    }
}

impl<'de> Deserialize<'de> for Units {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_amount(&s)
            .map(Units)
            .ok_or_else(|| de::Error::custom(format!("invalid amount {s:?}")))
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount(self.0))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A complete scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Host time before the first call. Defaults to the wall clock.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    pub ledger: LedgerSetup,
    #[serde(default)]
    pub calls: Vec<Call>,
}

/// Deployment of the token ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSetup {
    pub address: Address,
    /// Initial owner, board and upgrade master.
    pub issuer: Address,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
}

fn default_name() -> String {
    DEFAULT_TOKEN_NAME.to_string()
}

fn default_symbol() -> String {
    DEFAULT_TOKEN_SYMBOL.to_string()
}

/// One call in the replay.
#[derive(Debug, Clone, Deserialize)]
pub struct Call {
    pub caller: Address,
    /// Value attached to the call.
    #[serde(default)]
    pub value: Option<Units>,
    /// Seconds to advance the host clock before the call.
    #[serde(default)]
    pub advance_secs: i64,
    /// `"ok"` or an error kind such as `"InvalidState"`.
    #[serde(default)]
    pub expect: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

impl Call {
    /// Whether `outcome` satisfies this call's expectation. Calls without
    /// one accept any outcome.
    pub fn expectation_met(&self, outcome: Result<(), ErrorKind>) -> bool {
        match (&self.expect, outcome) {
            (None, _) => true,
            (Some(want), Ok(())) => want.eq_ignore_ascii_case("ok"),
            (Some(want), Err(kind)) => want.eq_ignore_ascii_case(&kind.to_string()),
        }
    }
}

/// The operation a call performs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    // Ledger
    Mint {
        to: Address,
        amount: Units,
    },
    FinishMinting {
        #[serde(default)]
        presale: bool,
        #[serde(default)]
        crowdsale: bool,
    },
    SetReleaseAgent {
        agent: Address,
    },
    ReleaseTokenTransfer,
    SetTransferAgent {
        agent: Address,
        #[serde(default = "enabled")]
        enabled: bool,
    },
    Transfer {
        to: Address,
        amount: Units,
    },
    TransferFrom {
        from: Address,
        to: Address,
        amount: Units,
    },
    Approve {
        spender: Address,
        amount: Units,
    },
    IncreaseAllowance {
        spender: Address,
        amount: Units,
    },
    DecreaseAllowance {
        spender: Address,
        amount: Units,
    },
    TransferOwnership {
        new_owner: Address,
    },
    ChangeBoard {
        board: Address,
    },
    SetUpgradeMaster {
        master: Address,
    },

    // Upgrade
    DeploySuccessor {
        address: Address,
    },
    SetUpgradeAgent,
    Upgrade {
        amount: Units,
    },

    // Sale
    DeploySale(SaleSetup),
    Buy {
        sale: Address,
    },
    /// Plain value transfer to a sale, outside `buy`.
    Send {
        sale: Address,
    },
    Halt {
        sale: Address,
    },
    Unhalt {
        sale: Address,
    },
    ChangeEndTime {
        sale: Address,
        end_time: DateTime<Utc>,
    },
    UpdateWhitelist {
        sale: Address,
        address: Address,
        #[serde(default = "enabled")]
        status: bool,
    },
    Finalise {
        sale: Address,
    },
}

fn enabled() -> bool {
    true
}

impl Action {
    /// Operation name as written in the scenario.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Mint { .. } => "mint",
            Action::FinishMinting { .. } => "finish_minting",
            Action::SetReleaseAgent { .. } => "set_release_agent",
            Action::ReleaseTokenTransfer => "release_token_transfer",
            Action::SetTransferAgent { .. } => "set_transfer_agent",
            Action::Transfer { .. } => "transfer",
            Action::TransferFrom { .. } => "transfer_from",
            Action::Approve { .. } => "approve",
            Action::IncreaseAllowance { .. } => "increase_allowance",
            Action::DecreaseAllowance { .. } => "decrease_allowance",
            Action::TransferOwnership { .. } => "transfer_ownership",
            Action::ChangeBoard { .. } => "change_board",
            Action::SetUpgradeMaster { .. } => "set_upgrade_master",
            Action::DeploySuccessor { .. } => "deploy_successor",
            Action::SetUpgradeAgent => "set_upgrade_agent",
            Action::Upgrade { .. } => "upgrade",
            Action::DeploySale(_) => "deploy_sale",
            Action::Buy { .. } => "buy",
            Action::Send { .. } => "send",
            Action::Halt { .. } => "halt",
            Action::Unhalt { .. } => "unhalt",
            Action::ChangeEndTime { .. } => "change_end_time",
            Action::UpdateWhitelist { .. } => "update_whitelist",
            Action::Finalise { .. } => "finalise",
        }
    }
}

/// Parameters of a `deploy_sale` call. The window is relative to the host
/// time of the call; omitted economics fall back to the protocol defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaleSetup {
    pub address: Address,
    pub phase: SalePhase,
    pub wallet: Address,
    #[serde(default = "default_start_delay")]
    pub starts_in_secs: i64,
    #[serde(default = "default_duration")]
    pub duration_secs: i64,
    /// Tokens per smallest unit of value. A plain integer, not an amount.
    #[serde(default)]
    pub rate: Option<u64>,
    #[serde(default)]
    pub cap: Option<Units>,
    #[serde(default)]
    pub min_amount: Option<Units>,
    #[serde(default)]
    pub max_amount: Option<Units>,
    #[serde(default)]
    pub reserve_tokens: Option<Units>,
}

fn default_start_delay() -> i64 {
    DEFAULT_START_DELAY_SECS
}

fn default_duration() -> i64 {
    DEFAULT_SALE_DURATION_SECS
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Scenario {
    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(raw).context("malformed scenario JSON")?;
        Ok(scenario)
    }
}

/// A scenario that runs one presale end to end, opens transfers and
/// migrates part of the supply to a successor ledger.
pub fn template() -> serde_json::Value {
    serde_json::json!({
        "start_time": "2026-01-01T00:00:00Z",
        "ledger": { "address": "ledger", "issuer": "issuer" },
        "calls": [
            { "caller": "issuer", "op": "deploy_sale", "address": "presale",
              "phase": "presale", "wallet": "wallet", "duration_secs": 604800,
              "reserve_tokens": "100", "expect": "ok" },
            { "caller": "issuer", "op": "transfer_ownership", "new_owner": "presale",
              "expect": "ok" },
            { "caller": "issuer", "op": "update_whitelist", "sale": "presale",
              "address": "whale", "expect": "ok" },
            { "caller": "alice", "op": "buy", "sale": "presale", "value": "1",
              "expect": "InvalidState" },
            { "caller": "alice", "advance_secs": 86400, "op": "buy", "sale": "presale",
              "value": "1", "expect": "ok" },
            { "caller": "bob", "op": "buy", "sale": "presale", "value": "6",
              "expect": "LimitExceeded" },
            { "caller": "whale", "op": "buy", "sale": "presale", "value": "6",
              "expect": "ok" },
            { "caller": "alice", "op": "send", "sale": "presale", "value": "1",
              "expect": "InvalidState" },
            { "caller": "issuer", "op": "finalise", "sale": "presale",
              "expect": "InvalidState" },
            { "caller": "issuer", "advance_secs": 604800, "op": "finalise",
              "sale": "presale", "expect": "ok" },
            { "caller": "issuer", "op": "set_release_agent", "agent": "issuer",
              "expect": "ok" },
            { "caller": "issuer", "op": "release_token_transfer", "expect": "ok" },
            { "caller": "alice", "op": "transfer", "to": "bob", "amount": "500",
              "expect": "ok" },
            { "caller": "issuer", "op": "deploy_successor", "address": "ledger-v2",
              "expect": "ok" },
            { "caller": "issuer", "op": "set_upgrade_agent", "expect": "ok" },
            { "caller": "alice", "op": "upgrade", "amount": "250", "expect": "ok" },
            { "caller": "bob", "op": "upgrade", "amount": "500", "expect": "ok" }
        ]
    })
}
