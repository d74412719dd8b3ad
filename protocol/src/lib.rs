// Copyright (c) 2026 Tessera Contributors. MIT License.
// See LICENSE for details.

//! # Tessera Protocol — Core Primitives
//!
//! Shared vocabulary for the Tessera offering: a single-issuer token ledger
//! plus the sale engine that mints into it.
//!
//! - **address** — 20-byte addresses, hex rendering, label derivation.
//! - **context** — the caller/value/time envelope of every call.
//! - **time** — host clocks. Contracts never read wall time directly.
//! - **notification** — records emitted by committed calls.
//! - **config** — protocol constants and sale defaults.
//!
//! Amounts are plain `u128` integers with 18 fractional digits; all
//! arithmetic on them is checked by the contracts.

pub mod address;
pub mod config;
pub mod context;
pub mod notification;
pub mod time;

/// An amount in the smallest unit (18 fractional digits).
pub type Amount = u128;

pub use address::{Address, AddressError};
pub use context::CallContext;
pub use notification::Notification;
pub use time::{Clock, ManualClock, SystemClock};
