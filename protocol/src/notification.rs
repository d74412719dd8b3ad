//! # Notifications
//!
//! Fire-and-forget records of what a committed call changed. Contracts
//! append them to a journal only after every precondition has passed, so a
//! rejected call never produces a notification. The host drains the
//! journal after each call and orders the records with the call that
//! produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::Amount;

/// Everything a ledger or sale can announce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// New balance was created for `to`.
    Mint { to: Address, amount: Amount },
    /// Balance moved between holders. Mints are reported with `from` zero.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// An allowance was set.
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    /// A minting phase flag was closed.
    MintingClosed {
        presale_closed: bool,
        crowdsale_closed: bool,
    },
    /// The release agent was assigned.
    ReleaseAgentSet { agent: Address },
    /// General transfers are now open.
    TransfersReleased,
    /// Pre-release transfer permission changed.
    TransferAgentSet { agent: Address, enabled: bool },
    /// Ledger ownership changed hands.
    OwnershipTransferred { previous: Address, owner: Address },
    /// The board address rotated.
    BoardChanged { previous: Address, board: Address },
    /// The upgrade master changed.
    UpgradeMasterSet { master: Address },
    /// A successor ledger was registered as the upgrade agent.
    UpgradeAgentSet { agent: Address },
    /// Balance migrated to the successor ledger.
    Upgrade {
        holder: Address,
        agent: Address,
        amount: Amount,
    },
    /// A contribution was accepted and tokens minted.
    TokenPurchase {
        purchaser: Address,
        value: Amount,
        amount: Amount,
    },
    /// A whitelist flag changed.
    WhitelistUpdated { address: Address, status: bool },
    /// The sale end time moved.
    EndTimeChanged { end_time: DateTime<Utc> },
    /// The sale was halted.
    Halted,
    /// The sale resumed.
    Unhalted,
    /// The sale completed and handed the ledger back.
    Finalised { wallet: Address, reserve: Amount },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Mint { to, amount } => write!(f, "Mint({to}, {amount})"),
            Notification::Transfer { from, to, amount } => {
                write!(f, "Transfer({from} -> {to}, {amount})")
            }
            Notification::Approval {
                owner,
                spender,
                amount,
            } => write!(f, "Approval({owner} -> {spender}, {amount})"),
            Notification::MintingClosed {
                presale_closed,
                crowdsale_closed,
            } => write!(
                f,
                "MintingClosed(presale={presale_closed}, crowdsale={crowdsale_closed})"
            ),
            Notification::ReleaseAgentSet { agent } => write!(f, "ReleaseAgentSet({agent})"),
            Notification::TransfersReleased => write!(f, "TransfersReleased"),
            Notification::TransferAgentSet { agent, enabled } => {
                write!(f, "TransferAgentSet({agent}, {enabled})")
            }
            Notification::OwnershipTransferred { previous, owner } => {
                write!(f, "OwnershipTransferred({previous} -> {owner})")
            }
            Notification::BoardChanged { previous, board } => {
                write!(f, "BoardChanged({previous} -> {board})")
            }
            Notification::UpgradeMasterSet { master } => write!(f, "UpgradeMasterSet({master})"),
            Notification::UpgradeAgentSet { agent } => write!(f, "UpgradeAgentSet({agent})"),
            Notification::Upgrade {
                holder,
                agent,
                amount,
            } => write!(f, "Upgrade({holder} -> {agent}, {amount})"),
            Notification::TokenPurchase {
                purchaser,
                value,
                amount,
            } => write!(f, "TokenPurchase({purchaser}, value={value}, tokens={amount})"),
            Notification::WhitelistUpdated { address, status } => {
                write!(f, "WhitelistUpdated({address}, {status})")
            }
            Notification::EndTimeChanged { end_time } => write!(f, "EndTimeChanged({end_time})"),
            Notification::Halted => write!(f, "Halted"),
            Notification::Unhalted => write!(f, "Unhalted"),
            Notification::Finalised { wallet, reserve } => {
                write!(f, "Finalised(wallet={wallet}, reserve={reserve})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_serialize_with_event_tag() {
        let n = Notification::WhitelistUpdated {
            address: Address::from_label("alice"),
            status: true,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["event"], "whitelist_updated");
        assert_eq!(json["status"], true);
    }

    #[test]
    fn unit_variants_display() {
        assert_eq!(Notification::Halted.to_string(), "Halted");
        assert_eq!(Notification::TransfersReleased.to_string(), "TransfersReleased");
    }
}
