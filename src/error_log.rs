//! Persisted application error log.
//!
//! Errors that escape a handler are written to `tracing` and to a
//! [`BoundedLedger`] of [`ErrorRecord`]s, so operators can review recent
//! failures with `/errors` without shell access to the log files.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::error;

use crate::ledger::{BoundedLedger, LedgerEntry, LedgerError, Stamped};

/// One reported application error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Where the error happened (e.g. `telegram.message`).
    pub context: String,
    /// Rendered error chain.
    pub message: String,
    /// Telegram user whose update triggered the error, if any.
    pub operator_id: Option<i64>,
}

impl LedgerEntry for ErrorRecord {
    const TABLE: &'static str = "error_ledger";
}

/// Error reporter backed by the error ledger.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    ledger: BoundedLedger<ErrorRecord>,
}

impl ErrorLog {
    /// Create an error log retaining at most `capacity` records.
    pub fn new(db: SqlitePool, capacity: u32) -> Self {
        Self {
            ledger: BoundedLedger::new(db, capacity),
        }
    }

    /// Log an error and persist it.
    ///
    /// Uses the alternate `Display` form so `anyhow` chains keep their causes.
    /// Persistence failures are swallowed by the ledger.
    ///
    /// `err` is held across the ledger write, so it must be `Sync` for the
    /// returned future to be `Send` (dispatcher handlers require it).
    pub async fn report(
        &self,
        context: &str,
        operator_id: Option<i64>,
        err: &(dyn fmt::Display + Sync),
    ) {
        let message = format!("{err:#}");
        error!(context, operator_id, error = %message, "handler error");

        let record = ErrorRecord {
            context: context.to_owned(),
            message,
            operator_id,
        };
        self.ledger.append(&record).await;
    }

    /// Up to `limit` most recent errors, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the ledger cannot be read.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Stamped<ErrorRecord>>, LedgerError> {
        self.ledger.recent(limit).await
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &BoundedLedger<ErrorRecord> {
        &self.ledger
    }
}
