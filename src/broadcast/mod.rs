//! Operator broadcasts: draft composition, album aggregation, and delivery.
//!
//! The [`Composer`] owns one in-memory draft per operator and drives it
//! through `AwaitingPhotos → AwaitingText → Preview`. Album photos are
//! debounced by a per-draft timer (see [`aggregator`]). A confirmed draft
//! becomes a [`Composition`] that the [`DeliveryEngine`] fans out to every
//! deliverable recipient, recording the outcome in the broadcast ledger.

use std::collections::HashSet;

pub mod aggregator;
pub mod composer;
pub mod delivery;
pub mod report;

pub use aggregator::PhotoOutcome;
pub use composer::{
    ComposeStart, Composer, ComposerSettings, ConfirmError, DraftSnapshot, TextOutcome,
};
pub use delivery::{
    BroadcastRecord, BroadcastTransport, DeliveryEngine, DeliveryError, DeliveryOutcome,
    DirectoryError, Recipient, RecipientDirectory, TransportError,
};
pub use report::{overflow_report, summarize, DeliverySummary, MAX_SUMMARY_LEN};

/// Opaque media reference (a Telegram file id).
pub type PhotoRef = String;

/// Stage of an operator's draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftState {
    /// Collecting photos; the initial state.
    AwaitingPhotos,
    /// Photos settled; waiting for the caption.
    AwaitingText,
    /// Caption received; waiting for confirm or cancel.
    Preview,
}

impl DraftState {
    /// Short lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPhotos => "awaiting_photos",
            Self::AwaitingText => "awaiting_text",
            Self::Preview => "preview",
        }
    }
}

/// A finished draft: what gets previewed and delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    /// Photos in arrival order; never empty.
    pub photos: Vec<PhotoRef>,
    /// Trimmed, non-empty caption.
    pub text: String,
}

impl Composition {
    /// Whether this composition goes out as a grouped album.
    pub fn is_album(&self) -> bool {
        self.photos.len() > 1
    }
}

/// Notices pushed to operators outside the request/response flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorNotice {
    /// The album burst settled; the draft now waits for caption text.
    AlbumReady {
        /// Operator whose draft advanced.
        operator_id: i64,
        /// Photos collected.
        photos: usize,
    },
}

impl OperatorNotice {
    /// Operator the notice is addressed to.
    pub fn operator_id(&self) -> i64 {
        match self {
            Self::AlbumReady { operator_id, .. } => *operator_id,
        }
    }
}

/// Decides who holds the broadcast capability.
pub trait Authorizer: Send + Sync {
    /// Whether `operator_id` may compose and send broadcasts.
    fn is_authorized_operator(&self, operator_id: i64) -> bool;
}

/// Static allow-list of operator IDs, usually from `telegram.operators`.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    operators: HashSet<i64>,
}

impl AllowList {
    /// Build an allow-list from operator IDs.
    pub fn new(operators: impl IntoIterator<Item = i64>) -> Self {
        Self {
            operators: operators.into_iter().collect(),
        }
    }
}

impl Authorizer for AllowList {
    fn is_authorized_operator(&self, operator_id: i64) -> bool {
        self.operators.contains(&operator_id)
    }
}
