//! # One-Way Phase Locks
//!
//! The ledger's minting lock, its transfer lock and the sale's completion
//! flag only ever move forward. Each is a small enum whose transition
//! methods consume the current value and return the next one; there is no
//! method that produces an earlier phase, so a reverse transition cannot be
//! written.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ContractError, ContractResult};

// ---------------------------------------------------------------------------
// Minting
// ---------------------------------------------------------------------------

/// Minting lifecycle of the ledger.
///
/// The presale flag closes first; closing the crowdsale flag finishes
/// minting for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MintingPhase {
    /// Both phase flags open.
    #[default]
    Open,
    /// The presale flag is closed, the crowdsale may still mint.
    PresaleClosed,
    /// Both flags closed. Terminal.
    Finished,
}

impl MintingPhase {
    /// Applies a `finish_minting(close_presale, close_crowdsale)` request.
    ///
    /// Either flag may be closed on its own, but the crowdsale flag may not
    /// close while the presale flag would remain open. Re-closing a flag
    /// that is already closed, or closing nothing, is rejected.
    pub fn close(self, close_presale: bool, close_crowdsale: bool) -> ContractResult<Self> {
        if self == MintingPhase::Finished {
            return Err(ContractError::invalid_state(
                "minting finished",
                "an open minting phase",
            ));
        }
        if !close_presale && !close_crowdsale {
            return Err(ContractError::InvalidArgument(
                "finish_minting must close at least one phase".into(),
            ));
        }
        if close_presale && self.presale_closed() {
            return Err(ContractError::invalid_state(
                "presale minting already closed",
                "presale minting open",
            ));
        }
        let presale_closed = self.presale_closed() || close_presale;
        if close_crowdsale {
            if !presale_closed {
                return Err(ContractError::invalid_state(
                    "presale minting open",
                    "presale closed before the crowdsale",
                ));
            }
            return Ok(MintingPhase::Finished);
        }
        Ok(MintingPhase::PresaleClosed)
    }

    pub fn presale_closed(&self) -> bool {
        !matches!(self, MintingPhase::Open)
    }

    pub fn crowdsale_closed(&self) -> bool {
        matches!(self, MintingPhase::Finished)
    }

    /// `true` once no further minting is possible.
    pub fn is_finished(&self) -> bool {
        matches!(self, MintingPhase::Finished)
    }
}

impl fmt::Display for MintingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintingPhase::Open => write!(f, "Open"),
            MintingPhase::PresaleClosed => write!(f, "PresaleClosed"),
            MintingPhase::Finished => write!(f, "Finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// Whether general transfers are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransferLock {
    /// Only transfer agents may move balance.
    #[default]
    Locked,
    /// Anyone may transfer. Terminal.
    Released,
}

impl TransferLock {
    /// Opens transfers. Fails if they are already open.
    pub fn release(self) -> ContractResult<Self> {
        match self {
            TransferLock::Locked => Ok(TransferLock::Released),
            TransferLock::Released => Err(ContractError::invalid_state(
                "transfers already released",
                "transfers locked",
            )),
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self, TransferLock::Released)
    }
}

// ---------------------------------------------------------------------------
// Sale completion
// ---------------------------------------------------------------------------

/// Completion flag of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Completion {
    #[default]
    Pending,
    /// Finalised. Terminal.
    Completed,
}

impl Completion {
    /// Marks the sale completed. Fails the second time.
    pub fn complete(self) -> ContractResult<Self> {
        match self {
            Completion::Pending => Ok(Completion::Completed),
            Completion::Completed => Err(ContractError::invalid_state(
                "sale already finalised",
                "sale not finalised",
            )),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Completion::Completed)
    }
}
