//! Bounded, append-only outcome ledgers persisted in SQLite.
//!
//! A [`BoundedLedger`] keeps at most `capacity` entries. Every append inserts
//! the new row and, in the same transaction, deletes exactly the overflow
//! amount of oldest rows (by creation timestamp, then row id). Entries are
//! never updated and callers cannot delete individual rows.
//!
//! The ledger is generic over the entry shape: each entry type names its own
//! table and is stored as a JSON payload, so the broadcast history and the
//! error log are two independent instances of the same code.

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// A record type that can be stored in a [`BoundedLedger`].
pub trait LedgerEntry: Serialize + DeserializeOwned + Send + Sync {
    /// Table holding this ledger's rows (`id`, `created_at`, `payload`).
    ///
    /// Interpolated into SQL, so it must be a compile-time constant naming a
    /// table from the bundled schema.
    const TABLE: &'static str;
}

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Entry payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A stored creation timestamp is not valid RFC 3339.
    #[error("invalid created_at on row {id}: {value:?}")]
    Timestamp {
        /// Row id with the bad value.
        id: i64,
        /// The unparseable value.
        value: String,
    },
}

/// A persisted entry together with its row metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<E> {
    /// Row id (monotonic insertion order).
    pub id: i64,
    /// Creation timestamp; the eviction order.
    pub created_at: DateTime<Utc>,
    /// The immutable record.
    pub entry: E,
}

/// Append-only ledger holding at most `capacity` entries of type `E`.
pub struct BoundedLedger<E> {
    db: SqlitePool,
    capacity: u32,
    _entry: PhantomData<fn() -> E>,
}

impl<E> Clone for BoundedLedger<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            capacity: self.capacity,
            _entry: PhantomData,
        }
    }
}

impl<E: LedgerEntry> fmt::Debug for BoundedLedger<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedLedger")
            .field("table", &E::TABLE)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<E: LedgerEntry> BoundedLedger<E> {
    /// Create a ledger over `db` retaining at most `capacity` entries.
    pub fn new(db: SqlitePool, capacity: u32) -> Self {
        Self {
            db,
            capacity,
            _entry: PhantomData,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Append an entry, pruning the oldest overflow.
    ///
    /// Never fails: bookkeeping must not block the workflow that produced the
    /// entry, so persistence errors are logged and dropped.
    pub async fn append(&self, entry: &E) {
        if let Err(e) = self.try_append(entry).await {
            warn!(table = E::TABLE, error = %e, "ledger append failed; entry dropped");
        }
    }

    /// Append an entry and return how many old entries were evicted.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the payload cannot be encoded or any
    /// statement fails; the transaction is rolled back in that case.
    pub async fn try_append(&self, entry: &E) -> Result<u64, LedgerError> {
        let payload = serde_json::to_string(entry)?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let insert_sql = format!(
            "INSERT INTO {} (created_at, payload) VALUES (?1, ?2)",
            E::TABLE
        );
        let count_sql = format!("SELECT count(*) FROM {}", E::TABLE);
        let prune_sql = format!(
            "DELETE FROM {table} WHERE id IN \
             (SELECT id FROM {table} ORDER BY created_at ASC, id ASC LIMIT ?1)",
            table = E::TABLE
        );

        let mut tx = self.db.begin().await?;

        sqlx::query(&insert_sql)
            .bind(&created_at)
            .bind(&payload)
            .execute(&mut *tx)
            .await?;

        let (count,): (i64,) = sqlx::query_as(&count_sql).fetch_one(&mut *tx).await?;
        let overflow = count.saturating_sub(i64::from(self.capacity));

        let evicted = if overflow > 0 {
            sqlx::query(&prune_sql)
                .bind(overflow)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            0
        };

        tx.commit().await?;

        if evicted > 0 {
            debug!(table = E::TABLE, evicted, capacity = self.capacity, "ledger pruned");
        }
        Ok(evicted)
    }

    /// Number of retained entries.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] on SQLite failure.
    pub async fn count(&self) -> Result<u64, LedgerError> {
        let sql = format!("SELECT count(*) FROM {}", E::TABLE);
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.db).await?;
        // count(*) is never negative.
        Ok(count.unsigned_abs())
    }

    /// Up to `limit` entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] on SQLite failure or a corrupt row.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Stamped<E>>, LedgerError> {
        let sql = format!(
            "SELECT id, created_at, payload FROM {} \
             ORDER BY created_at DESC, id DESC LIMIT ?1",
            E::TABLE
        );
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(i64, String, String)> = sqlx::query_as(&sql)
            .bind(limit_i64)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter()
            .map(|(id, created_at, payload)| {
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|_| LedgerError::Timestamp {
                        id,
                        value: created_at.clone(),
                    })?
                    .with_timezone(&Utc);
                let entry = serde_json::from_str(&payload)?;
                Ok(Stamped {
                    id,
                    created_at,
                    entry,
                })
            })
            .collect()
    }
}
