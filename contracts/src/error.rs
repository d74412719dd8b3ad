//! # Contract Errors
//!
//! One error type for the ledger, the upgrade coordinator and the sale.
//! Every variant maps onto one of five [`ErrorKind`]s so callers can react
//! to the class of failure without matching on details.
//!
//! A returned error always means the call left no trace: the contracts
//! check every precondition before touching state.

use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_protocol::{Address, Amount};
use thiserror::Error;

use crate::access::Role;

/// The class of a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The caller lacks the required role.
    Unauthorized,
    /// A zero address, zero amount or malformed time ordering.
    InvalidArgument,
    /// The operation is not legal in the current phase.
    InvalidState,
    /// A per-purchase, per-address, global or arithmetic bound was hit.
    LimitExceeded,
    /// The caller's balance or allowance is too small.
    InsufficientBalance,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorKind::InvalidState => write!(f, "InvalidState"),
            ErrorKind::LimitExceeded => write!(f, "LimitExceeded"),
            ErrorKind::InsufficientBalance => write!(f, "InsufficientBalance"),
        }
    }
}

/// Errors returned by every contract operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The caller does not hold the role the operation requires.
    #[error("unauthorized: {caller} is not the {role}")]
    Unauthorized {
        /// The role that was required.
        role: Role,
        /// The address that attempted the call.
        caller: Address,
    },

    /// The zero address was supplied where a real one is required.
    #[error("invalid argument: {field} must not be the zero address")]
    ZeroAddress {
        /// Name of the offending parameter.
        field: &'static str,
    },

    /// A zero amount was supplied where a positive one is required.
    #[error("invalid argument: {field} must be greater than zero")]
    ZeroAmount {
        /// Name of the offending parameter.
        field: &'static str,
    },

    /// Any other malformed argument (time ordering, self-assignment,
    /// a successor that fails its capability check).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current phase.
    #[error("invalid state: {current}, expected {expected}")]
    InvalidState {
        /// Description of the current phase.
        current: String,
        /// Phase the operation requires.
        expected: String,
    },

    /// A purchase bound or the cap would be violated.
    #[error("limit exceeded: {limit} is {allowed}, attempted {attempted}")]
    LimitExceeded {
        /// Which limit was hit.
        limit: &'static str,
        /// The bound itself.
        allowed: Amount,
        /// The amount that would have resulted.
        attempted: Amount,
    },

    /// Checked arithmetic failed.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Balance or allowance too small for the requested amount.
    #[error("insufficient {what}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// `"balance"` or `"allowance"`.
        what: &'static str,
        /// What the caller has.
        available: Amount,
        /// What the caller asked for.
        requested: Amount,
    },
}

impl ContractError {
    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ContractError::ZeroAddress { .. }
            | ContractError::ZeroAmount { .. }
            | ContractError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ContractError::InvalidState { .. } => ErrorKind::InvalidState,
            ContractError::LimitExceeded { .. } | ContractError::Overflow(_) => {
                ErrorKind::LimitExceeded
            }
            ContractError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
        }
    }

    pub(crate) fn invalid_state(current: impl Into<String>, expected: impl Into<String>) -> Self {
        ContractError::InvalidState {
            current: current.into(),
            expected: expected.into(),
        }
    }
}

/// Shorthand for contract results.
pub type ContractResult<T> = Result<T, ContractError>;
