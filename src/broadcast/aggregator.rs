//! Album aggregation with a reset-on-arrival debounce timer.
//!
//! Telegram delivers an album as one message per photo sharing a media group
//! id, with no end-of-album marker. Each album photo re-arms the draft's
//! timer; when the quiet period elapses the draft moves to `AwaitingText` and
//! the operator is notified. Single photos skip the timer entirely.
//!
//! Timer ownership: the timer task carries its draft id and generation and
//! does nothing unless both still match the draft's pending timer. Dropping
//! an [`AlbumTimer`] aborts its task, so replacing or destroying a draft
//! cancels the timer even before the check runs.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::composer::{lock_drafts, Composer, DraftMap};
use super::{DraftState, OperatorNotice, PhotoRef};

/// Result of a photo message from an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoOutcome {
    /// The operator has no draft.
    NoDraft,
    /// The draft has moved past photo collection.
    NotAcceptingPhotos,
    /// The draft already holds the maximum; the photo was dropped.
    LimitReached {
        /// Configured maximum.
        max: usize,
    },
    /// Album photo buffered; the debounce timer was (re)armed.
    Buffered {
        /// Photos collected so far.
        photos: usize,
    },
    /// Single photo accepted; the draft now waits for text.
    ReadyForText {
        /// Photos collected.
        photos: usize,
    },
}

/// Handle to a pending album timer. Aborts the timer task when dropped.
#[derive(Debug)]
pub(crate) struct AlbumTimer {
    pub(crate) generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl AlbumTimer {
    /// Release the handle without aborting; used by the firing task itself.
    fn disarm(mut self) {
        self.handle.take();
    }
}

impl Drop for AlbumTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Composer {
    /// Feed a photo into the operator's draft.
    ///
    /// `album_id` is the media group id when the photo belongs to an album.
    /// Must be called from within a Tokio runtime: album photos spawn the
    /// debounce task.
    pub fn on_photo(
        &self,
        operator_id: i64,
        photo: PhotoRef,
        album_id: Option<String>,
    ) -> PhotoOutcome {
        let mut drafts = lock_drafts(&self.drafts);
        let Some(draft) = drafts.get_mut(&operator_id) else {
            return PhotoOutcome::NoDraft;
        };

        if draft.state != DraftState::AwaitingPhotos {
            return PhotoOutcome::NotAcceptingPhotos;
        }

        let max = self.settings.max_photos;
        if draft.photos.len() >= max {
            debug!(operator_id, max, "broadcast photo rejected: limit reached");
            return PhotoOutcome::LimitReached { max };
        }

        draft.photos.push(photo);
        let photos = draft.photos.len();

        match album_id {
            Some(album_id) => {
                let generation = draft.timer_generation.wrapping_add(1);
                draft.timer_generation = generation;
                draft.album_id = Some(album_id);

                let handle = spawn_album_timer(
                    self.drafts.clone(),
                    self.notices.clone(),
                    operator_id,
                    draft.id,
                    generation,
                    self.settings.album_debounce,
                );
                // Replacing the previous timer drops it, aborting its task.
                draft.timer = Some(AlbumTimer {
                    generation,
                    handle: Some(handle),
                });

                trace!(operator_id, photos, generation, "album photo buffered");
                PhotoOutcome::Buffered { photos }
            }
            None => {
                draft.timer = None;
                draft.album_id = None;
                draft.state = DraftState::AwaitingText;

                debug!(operator_id, photos, "single photo accepted, awaiting text");
                PhotoOutcome::ReadyForText { photos }
            }
        }
    }
}

/// Spawn the debounce task for one album timer generation.
///
/// The deadline is fixed now, not when the task is first polled.
fn spawn_album_timer(
    drafts: DraftMap,
    notices: mpsc::Sender<OperatorNotice>,
    operator_id: i64,
    draft_id: u64,
    generation: u64,
    delay: Duration,
) -> JoinHandle<()> {
    let now = Instant::now();
    let deadline = now.checked_add(delay).unwrap_or(now);

    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;

        let settled = {
            let mut drafts = lock_drafts(&drafts);
            match drafts.get_mut(&operator_id) {
                Some(draft)
                    if draft.id == draft_id
                        && draft.state == DraftState::AwaitingPhotos
                        && draft
                            .timer
                            .as_ref()
                            .is_some_and(|t| t.generation == generation) =>
                {
                    draft.state = DraftState::AwaitingText;
                    draft.album_id = None;
                    if let Some(timer) = draft.timer.take() {
                        timer.disarm();
                    }
                    Some(draft.photos.len())
                }
                _ => None,
            }
        };

        let Some(photos) = settled else {
            trace!(operator_id, draft_id, generation, "stale album timer ignored");
            return;
        };

        debug!(operator_id, photos, "album settled, awaiting text");
        let notice = OperatorNotice::AlbumReady {
            operator_id,
            photos,
        };
        if notices.send(notice).await.is_err() {
            debug!(operator_id, "notice channel closed; album-ready notice dropped");
        }
    })
}
