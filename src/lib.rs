//! Coachbot: the Telegram front end of a personal coaching service.
//!
//! Operators compose photo broadcasts through a per-operator draft state
//! machine, the delivery engine fans them out to every known chat user, and
//! bounded SQLite ledgers keep the most recent broadcast outcomes and errors.
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod logging;

pub mod error_log;
pub mod ledger;
pub mod recipients;

pub mod broadcast;
pub mod telegram;
