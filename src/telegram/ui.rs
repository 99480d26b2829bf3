//! HTML formatting, operator prompts, and inline keyboard helpers.
//!
//! All output uses HTML parse mode (never MarkdownV2) per project convention.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::broadcast::{ComposeStart, ConfirmError, PhotoOutcome, TextOutcome};

/// Callback data prefix of the preview's send button.
///
/// Button data is `<prefix>:<draft id>` so a stale preview can be told apart
/// from the current one.
pub const CALLBACK_SEND: &str = "bc:send";

/// Callback data prefix of the preview's cancel button.
pub const CALLBACK_CANCEL: &str = "bc:cancel";

/// Reply to `/broadcast` from a non-operator.
pub const UNAUTHORIZED: &str = "You are not allowed to send broadcasts.";

/// Escape special HTML characters in user-provided text.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Action requested through a preview button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAction {
    /// Deliver the previewed broadcast.
    Send,
    /// Discard the draft.
    Cancel,
}

/// Parse preview button callback data into the action and its draft id.
pub fn parse_callback(data: &str) -> Option<(BroadcastAction, u64)> {
    let (prefix, draft_id) = data.rsplit_once(':')?;
    let action = match prefix {
        CALLBACK_SEND => BroadcastAction::Send,
        CALLBACK_CANCEL => BroadcastAction::Cancel,
        _ => return None,
    };
    let draft_id = draft_id.parse().ok()?;
    Some((action, draft_id))
}

/// Callback data for `action` on draft `draft_id`.
pub fn callback_data(action: BroadcastAction, draft_id: u64) -> String {
    let prefix = match action {
        BroadcastAction::Send => CALLBACK_SEND,
        BroadcastAction::Cancel => CALLBACK_CANCEL,
    };
    format!("{prefix}:{draft_id}")
}

/// Inline keyboard with Send and Cancel buttons bound to one draft.
pub fn broadcast_keyboard(draft_id: u64) -> InlineKeyboardMarkup {
    let send = InlineKeyboardButton::callback(
        "\u{2705} Send".to_owned(),
        callback_data(BroadcastAction::Send, draft_id),
    );
    let cancel = InlineKeyboardButton::callback(
        "\u{274C} Cancel".to_owned(),
        callback_data(BroadcastAction::Cancel, draft_id),
    );
    InlineKeyboardMarkup::new(vec![vec![send, cancel]])
}

/// Reply to `/broadcast`.
pub fn compose_start_text(start: ComposeStart, max_photos: usize) -> String {
    match start {
        ComposeStart::Started { replaced } => {
            let prefix = if replaced {
                "Previous draft discarded.\n"
            } else {
                ""
            };
            format!(
                "{prefix}<b>New broadcast</b>\nSend up to {max_photos} photos (one by one or as an album). /cancel to abort."
            )
        }
        ComposeStart::Unauthorized => UNAUTHORIZED.to_owned(),
    }
}

/// Reply to a photo, if any. Album photos stay silent until the burst settles.
pub fn photo_outcome_text(outcome: PhotoOutcome) -> Option<String> {
    match outcome {
        PhotoOutcome::NoDraft | PhotoOutcome::NotAcceptingPhotos | PhotoOutcome::Buffered { .. } => {
            None
        }
        PhotoOutcome::LimitReached { max } => Some(format!(
            "Limit reached: a broadcast can carry at most {max} photos."
        )),
        PhotoOutcome::ReadyForText { photos } => Some(photos_ready_text(photos)),
    }
}

/// Prompt sent once the draft's photos are settled.
pub fn photos_ready_text(photos: usize) -> String {
    format!("Photos received: {photos}. Now send the caption text.")
}

/// Reply to a text message, if any. Previews are rendered separately.
pub fn text_outcome_text(outcome: &TextOutcome) -> Option<String> {
    match outcome {
        TextOutcome::Ignored | TextOutcome::Preview { .. } => None,
        TextOutcome::PhotosRequired => Some("Send the photos first, then the caption.".to_owned()),
        TextOutcome::EmptyText => {
            Some("The caption cannot be empty. Send the caption text.".to_owned())
        }
        TextOutcome::TooLong { max } => Some(format!(
            "The caption is too long: at most {max} characters. Send a shorter caption."
        )),
    }
}

/// Question shown under a broadcast preview.
pub fn preview_prompt(recipients: Option<u64>) -> String {
    match recipients {
        Some(n) => format!("<b>Preview</b>\nSend this broadcast to {n} recipients?"),
        None => "<b>Preview</b>\nSend this broadcast?".to_owned(),
    }
}

/// Reply to `/cancel` or the cancel button.
pub fn cancel_text(had_draft: bool) -> &'static str {
    if had_draft {
        "Broadcast cancelled."
    } else {
        "Nothing to cancel."
    }
}

/// Callback answer for a rejected confirmation.
pub fn confirm_error_text(err: ConfirmError) -> &'static str {
    match err {
        ConfirmError::NoDraft => "This broadcast is no longer active.",
        ConfirmError::NotReady(_) => "The broadcast is not ready yet.",
        ConfirmError::Stale { .. } => "This preview is outdated. Use the latest one.",
    }
}
