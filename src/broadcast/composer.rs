//! Per-operator draft state machine.
//!
//! Drafts live in a process-wide map keyed by operator id and are never
//! persisted. The map is behind a sync [`Mutex`] since no critical section
//! awaits; album timers re-enter it from their own tasks (see
//! [`super::aggregator`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::BroadcastConfig;

use super::aggregator::AlbumTimer;
use super::{Authorizer, Composition, DraftState, OperatorNotice, PhotoRef};

/// Tuning for draft composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerSettings {
    /// Quiet period after the last album photo.
    pub album_debounce: Duration,
    /// Maximum photos per draft.
    pub max_photos: usize,
    /// Longest accepted caption, in characters.
    pub max_caption_chars: usize,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self::from(&BroadcastConfig::default())
    }
}

impl From<&BroadcastConfig> for ComposerSettings {
    fn from(config: &BroadcastConfig) -> Self {
        Self {
            album_debounce: config.album_debounce(),
            max_photos: config.max_photos,
            max_caption_chars: config.max_caption_chars,
        }
    }
}

/// In-memory draft for one operator.
#[derive(Debug)]
pub(crate) struct Draft {
    /// Unique per draft instance; lets stale timers detect replacement.
    pub(crate) id: u64,
    pub(crate) state: DraftState,
    pub(crate) photos: Vec<PhotoRef>,
    pub(crate) album_id: Option<String>,
    pub(crate) text: Option<String>,
    /// Pending album timer; dropping it aborts the timer task.
    pub(crate) timer: Option<AlbumTimer>,
    /// Last generation handed to an album timer of this draft.
    pub(crate) timer_generation: u64,
}

impl Draft {
    fn new(id: u64) -> Self {
        Self {
            id,
            state: DraftState::AwaitingPhotos,
            photos: Vec::new(),
            album_id: None,
            text: None,
            timer: None,
            timer_generation: 0,
        }
    }
}

pub(crate) type DraftMap = Arc<Mutex<HashMap<i64, Draft>>>;

/// Lock the draft map, recovering from poisoning.
///
/// Every mutation leaves the map consistent before any code that could
/// panic, so a poisoned guard is still safe to use.
pub(crate) fn lock_drafts(drafts: &Mutex<HashMap<i64, Draft>>) -> MutexGuard<'_, HashMap<i64, Draft>> {
    drafts.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of `/broadcast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStart {
    /// A fresh draft is waiting for photos.
    Started {
        /// Whether an earlier draft was discarded.
        replaced: bool,
    },
    /// The caller lacks the broadcast capability; no draft was created.
    Unauthorized,
}

/// Result of a text message from an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    /// No draft, or the draft is already in preview.
    Ignored,
    /// Draft is still collecting photos.
    PhotosRequired,
    /// Text was blank after trimming.
    EmptyText,
    /// Caption exceeds the photo caption limit; the draft keeps waiting.
    TooLong {
        /// Configured limit in characters.
        max: usize,
    },
    /// Draft moved to preview; render this composition with confirm/cancel.
    ///
    /// `draft_id` must travel with the preview buttons so a confirm from an
    /// older preview cannot take a newer draft.
    Preview {
        /// Identity of the previewed draft.
        draft_id: u64,
        /// What will be broadcast.
        composition: Composition,
    },
}

/// Why a confirmation was rejected. The draft is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmError {
    /// The operator has no draft.
    #[error("no broadcast draft to confirm")]
    NoDraft,
    /// The draft has not reached preview yet.
    #[error("broadcast draft is not ready (state: {})", .0.as_str())]
    NotReady(DraftState),
    /// The confirmation targets a draft that has since been replaced.
    #[error("broadcast draft {requested} was replaced by draft {current}")]
    Stale {
        /// Draft id carried by the confirmation.
        requested: u64,
        /// Draft currently open for the operator.
        current: u64,
    },
}

/// Read-only view of a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSnapshot {
    /// Draft identity, unique for the process lifetime.
    pub draft_id: u64,
    /// Current state.
    pub state: DraftState,
    /// Photos collected so far, in arrival order.
    pub photos: Vec<PhotoRef>,
    /// Album correlation token while a burst may still be arriving.
    pub album_id: Option<String>,
    /// Caption, once received.
    pub text: Option<String>,
    /// Whether an album timer is pending.
    pub timer_armed: bool,
}

/// Owner of all operator drafts.
pub struct Composer {
    pub(crate) drafts: DraftMap,
    next_draft_id: AtomicU64,
    pub(crate) settings: ComposerSettings,
    authorizer: Arc<dyn Authorizer>,
    pub(crate) notices: mpsc::Sender<OperatorNotice>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("settings", &self.settings)
            .field("drafts", &self.draft_count())
            .finish_non_exhaustive()
    }
}

impl Composer {
    /// Create a composer. Album-ready notices are pushed into `notices`.
    pub fn new(
        settings: ComposerSettings,
        authorizer: Arc<dyn Authorizer>,
        notices: mpsc::Sender<OperatorNotice>,
    ) -> Self {
        Self {
            drafts: Arc::new(Mutex::new(HashMap::new())),
            next_draft_id: AtomicU64::new(1),
            settings,
            authorizer,
            notices,
        }
    }

    /// Open a fresh draft for `operator_id`, discarding any previous one.
    ///
    /// Replacing a draft drops its album timer, which cancels it.
    pub fn start_compose(&self, operator_id: i64) -> ComposeStart {
        if !self.authorizer.is_authorized_operator(operator_id) {
            info!(operator_id, "broadcast compose refused: not an operator");
            return ComposeStart::Unauthorized;
        }

        let id = self.next_draft_id.fetch_add(1, Ordering::Relaxed);
        let previous = lock_drafts(&self.drafts).insert(operator_id, Draft::new(id));
        let replaced = previous.is_some();
        drop(previous);

        debug!(operator_id, draft_id = id, replaced, "broadcast draft opened");
        ComposeStart::Started { replaced }
    }

    /// Feed a text message into the operator's draft.
    pub fn on_text(&self, operator_id: i64, text: &str) -> TextOutcome {
        let mut drafts = lock_drafts(&self.drafts);
        let Some(draft) = drafts.get_mut(&operator_id) else {
            return TextOutcome::Ignored;
        };

        match draft.state {
            DraftState::AwaitingPhotos => TextOutcome::PhotosRequired,
            DraftState::Preview => TextOutcome::Ignored,
            DraftState::AwaitingText => {
                let caption = text.trim();
                if caption.is_empty() {
                    return TextOutcome::EmptyText;
                }
                let max = self.settings.max_caption_chars;
                if caption.chars().count() > max {
                    debug!(operator_id, max, "broadcast caption too long");
                    return TextOutcome::TooLong { max };
                }
                draft.text = Some(caption.to_owned());
                draft.state = DraftState::Preview;
                debug!(
                    operator_id,
                    draft_id = draft.id,
                    photos = draft.photos.len(),
                    "broadcast draft in preview"
                );
                TextOutcome::Preview {
                    draft_id: draft.id,
                    composition: Composition {
                        photos: draft.photos.clone(),
                        text: caption.to_owned(),
                    },
                }
            }
        }
    }

    /// Discard the operator's draft and its timer. Returns whether one existed.
    pub fn cancel(&self, operator_id: i64) -> bool {
        let removed = lock_drafts(&self.drafts).remove(&operator_id);
        let had_draft = removed.is_some();
        drop(removed);

        if had_draft {
            debug!(operator_id, "broadcast draft cancelled");
        }
        had_draft
    }

    /// Discard the draft only if it is still `draft_id`.
    ///
    /// A cancel button from an older preview leaves a newer draft alone.
    pub fn cancel_draft(&self, operator_id: i64, draft_id: u64) -> bool {
        let mut drafts = lock_drafts(&self.drafts);
        if drafts.get(&operator_id).map(|draft| draft.id) != Some(draft_id) {
            return false;
        }
        let removed = drafts.remove(&operator_id);
        drop(drafts);
        drop(removed);

        debug!(operator_id, draft_id, "broadcast draft cancelled");
        true
    }

    /// Take the previewed draft `draft_id` for delivery.
    ///
    /// On success the draft is destroyed before anything is sent, so a second
    /// confirm during a long fan-out cannot start a duplicate broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`ConfirmError`] unless `draft_id` is the operator's current
    /// draft and it is in preview with text.
    pub fn confirm(&self, operator_id: i64, draft_id: u64) -> Result<Composition, ConfirmError> {
        let mut drafts = lock_drafts(&self.drafts);
        let draft = drafts.get(&operator_id).ok_or(ConfirmError::NoDraft)?;

        if draft.id != draft_id {
            return Err(ConfirmError::Stale {
                requested: draft_id,
                current: draft.id,
            });
        }

        let ready = draft.state == DraftState::Preview
            && !draft.photos.is_empty()
            && draft.text.as_deref().is_some_and(|t| !t.is_empty());
        if !ready {
            return Err(ConfirmError::NotReady(draft.state));
        }

        let draft = drafts.remove(&operator_id).ok_or(ConfirmError::NoDraft)?;
        drop(drafts);

        let Draft { photos, text, .. } = draft;
        Ok(Composition {
            photos,
            text: text.unwrap_or_default(),
        })
    }

    /// Current view of the operator's draft, if any.
    pub fn snapshot(&self, operator_id: i64) -> Option<DraftSnapshot> {
        lock_drafts(&self.drafts)
            .get(&operator_id)
            .map(|draft| DraftSnapshot {
                draft_id: draft.id,
                state: draft.state,
                photos: draft.photos.clone(),
                album_id: draft.album_id.clone(),
                text: draft.text.clone(),
                timer_armed: draft.timer.is_some(),
            })
    }

    /// Number of open drafts.
    pub fn draft_count(&self) -> usize {
        lock_drafts(&self.drafts).len()
    }

    /// Composition settings.
    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }
}
