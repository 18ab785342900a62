//! Persistent sync state.
//!
//! The ledger remembers which events have already been downloaded so a
//! periodic run only fetches what is new. It is loaded once at start-up,
//! updated in memory, and written back atomically at the end of the run.

pub mod atomic;
pub mod error;
pub mod ledger;

pub use ledger::{Ledger, DEFAULT_LEDGER_CAP};
