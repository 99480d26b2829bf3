//! Broadcast fan-out.
//!
//! The [`DeliveryEngine`] resolves every deliverable recipient, sends the
//! composition to each one exactly once, and records the tally in the
//! broadcast ledger. A failed send is part of the normal outcome, never an
//! error: the loop always runs to the end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ledger::{BoundedLedger, LedgerEntry};

use super::{Composition, PhotoRef};

/// A user the broadcast can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Chat to send to.
    pub destination: i64,
    /// Name shown in the operator summary.
    pub display_name: String,
}

/// Failure of the recipient lookup itself.
#[derive(Debug, thiserror::Error)]
#[error("recipient directory unavailable: {0}")]
pub struct DirectoryError(pub String);

/// Failure of one outbound send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The messaging API rejected or failed the request.
    #[error("send failed: {0}")]
    Send(String),
    /// The send did not complete within the per-recipient timeout.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of broadcast recipients.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// All known users with a usable destination, excluding bot accounts.
    async fn list_deliverable_recipients(&self) -> Result<Vec<Recipient>, DirectoryError>;
}

/// Outbound messaging used by the delivery loop.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Send one photo with a caption.
    async fn send_single(
        &self,
        destination: i64,
        photo: &PhotoRef,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Send photos as one album; the caption goes on the first item only.
    async fn send_group(
        &self,
        destination: i64,
        photos: &[PhotoRef],
        caption: &str,
    ) -> Result<(), TransportError>;
}

/// Errors that prevent a broadcast from starting.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Recipients could not be resolved; nothing was sent.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Persisted summary of one completed broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    /// Operator who confirmed the broadcast.
    pub operator_id: i64,
    /// Caption that was sent.
    pub text: String,
    /// Photos that were sent.
    pub photo_refs: Vec<PhotoRef>,
    /// Recipients attempted.
    pub total: u64,
    /// Successful sends.
    pub success: u64,
    /// Failed sends.
    pub failure: u64,
}

impl LedgerEntry for BroadcastRecord {
    const TABLE: &'static str = "broadcast_ledger";
}

/// Tally of one broadcast.
///
/// Counts are derived from the name lists, so
/// `success + failure == total` holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Display names of recipients that received the broadcast.
    pub delivered: Vec<String>,
    /// Display names of recipients whose send failed.
    pub failed: Vec<String>,
}

impl DeliveryOutcome {
    /// Recipients attempted.
    pub fn total(&self) -> usize {
        self.delivered.len().saturating_add(self.failed.len())
    }

    /// Successful sends.
    pub fn success(&self) -> usize {
        self.delivered.len()
    }

    /// Failed sends.
    pub fn failure(&self) -> usize {
        self.failed.len()
    }
}

/// Fans compositions out to every deliverable recipient.
pub struct DeliveryEngine {
    directory: Arc<dyn RecipientDirectory>,
    transport: Arc<dyn BroadcastTransport>,
    ledger: BoundedLedger<BroadcastRecord>,
    send_timeout: Option<Duration>,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("ledger", &self.ledger)
            .field("send_timeout", &self.send_timeout)
            .finish_non_exhaustive()
    }
}

impl DeliveryEngine {
    /// Create an engine. `send_timeout` bounds each individual send.
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        transport: Arc<dyn BroadcastTransport>,
        ledger: BoundedLedger<BroadcastRecord>,
        send_timeout: Option<Duration>,
    ) -> Self {
        Self {
            directory,
            transport,
            ledger,
            send_timeout,
        }
    }

    /// Send `composition` to every deliverable recipient.
    ///
    /// Sends are sequential; each recipient gets exactly one attempt. The
    /// outcome is appended to the broadcast ledger before returning.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Directory`] if recipients cannot be resolved.
    /// Individual send failures are reported in the outcome instead.
    pub async fn deliver(
        &self,
        operator_id: i64,
        composition: &Composition,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let recipients = self.directory.list_deliverable_recipients().await?;
        info!(
            operator_id,
            recipients = recipients.len(),
            photos = composition.photos.len(),
            "broadcast delivery started"
        );

        let mut outcome = DeliveryOutcome::default();
        for recipient in recipients {
            match self.send_one(recipient.destination, composition).await {
                Ok(()) => {
                    debug!(destination = recipient.destination, "broadcast delivered");
                    outcome.delivered.push(recipient.display_name);
                }
                Err(e) => {
                    warn!(destination = recipient.destination, error = %e, "broadcast send failed");
                    outcome.failed.push(recipient.display_name);
                }
            }
        }

        let record = BroadcastRecord {
            operator_id,
            text: composition.text.clone(),
            photo_refs: composition.photos.clone(),
            total: to_u64(outcome.total()),
            success: to_u64(outcome.success()),
            failure: to_u64(outcome.failure()),
        };
        self.ledger.append(&record).await;

        info!(
            operator_id,
            total = outcome.total(),
            success = outcome.success(),
            failure = outcome.failure(),
            "broadcast delivery finished"
        );
        Ok(outcome)
    }

    /// One attempt for one recipient, bounded by the send timeout.
    async fn send_one(
        &self,
        destination: i64,
        composition: &Composition,
    ) -> Result<(), TransportError> {
        let send = async {
            match composition.photos.as_slice() {
                [single] => {
                    self.transport
                        .send_single(destination, single, &composition.text)
                        .await
                }
                photos => {
                    self.transport
                        .send_group(destination, photos, &composition.text)
                        .await
                }
            }
        };

        match self.send_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => send.await,
        }
    }

    /// The broadcast ledger this engine appends to.
    pub fn ledger(&self) -> &BoundedLedger<BroadcastRecord> {
        &self.ledger
    }
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
