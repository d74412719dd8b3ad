//! # Tessera Contracts
//!
//! Deterministic state machines for a single-issuer token offering:
//!
//! - **Ledger** — balances, allowances, a two-flag minting lock, a
//!   transfer release lock and the holder side of a successor migration.
//! - **Access** — the owner, board, upgrade master, release agent and
//!   transfer agent roles every privileged call is checked against.
//! - **Upgrade** — the coordinator that moves balance to a registered
//!   successor, plus a stock successor ledger.
//! - **Sale** — a capped, time-boxed presale or crowdsale that mints into
//!   the ledger at a fixed rate, with a whitelist that lifts the
//!   per-address ceiling.
//!
//! ## Design Principles
//!
//! 1. All amounts use checked arithmetic. Overflow is an error, never a wrap.
//! 2. Phases are enums with explicit transitions, not loose booleans.
//! 3. A failed call changes nothing. Preconditions are checked first and
//!    state is written last.
//! 4. Contracts never read the clock or hold references to each other;
//!    time, caller and value arrive in a [`CallContext`](tessera_protocol::CallContext)
//!    and peers are passed in per call.

pub mod access;
pub mod error;
pub mod ledger;
pub mod phase;
pub mod sale;
pub mod upgrade;
pub mod whitelist;

pub use access::{AccessRegistry, Role};
pub use error::{ContractError, ContractResult, ErrorKind};
pub use ledger::{Ledger, LedgerSnapshot};
pub use phase::{Completion, MintingPhase, TransferLock};
pub use sale::{Sale, SaleConfig, SalePhase, SaleSnapshot};
pub use upgrade::{SuccessorLedger, UpgradeAgent, UpgradeCoordinator, UpgradeState};
pub use whitelist::Whitelist;
