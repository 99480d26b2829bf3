//! Telegram slash command handlers.
//!
//! Each function handles a specific command and returns an HTML-formatted
//! response string. All output uses HTML parse mode per project convention.

use crate::broadcast::{BroadcastRecord, Composer};
use crate::error_log::ErrorLog;
use crate::ledger::BoundedLedger;
use crate::telegram::ui::{cancel_text, compose_start_text, escape_html};

/// Entries listed by `/history` and `/errors`.
pub const LISTING_LIMIT: usize = 10;

/// Longest caption or error message shown in a listing.
const PREVIEW_CHARS: usize = 80;

/// List the commands available to the caller.
pub fn handle_help(is_operator: bool) -> String {
    let mut lines = vec![
        "<b>Coaching bot</b>",
        "",
        "Your trainer sends announcements here.",
    ];
    if is_operator {
        lines.extend([
            "",
            "<b>Operator commands:</b>",
            "/broadcast — compose a photo broadcast",
            "/cancel — discard the current draft",
            "/history — recent broadcasts",
            "/errors — recent errors",
        ]);
    }
    lines.join("\n")
}

/// Open a new draft.
pub fn handle_broadcast(composer: &Composer, user_id: i64) -> String {
    let start = composer.start_compose(user_id);
    compose_start_text(start, composer.settings().max_photos)
}

/// Discard the current draft.
pub fn handle_cancel(composer: &Composer, user_id: i64) -> String {
    cancel_text(composer.cancel(user_id)).to_owned()
}

/// Show the most recent broadcast outcomes.
pub async fn handle_history(ledger: &BoundedLedger<BroadcastRecord>) -> String {
    let entries = match ledger.recent(LISTING_LIMIT).await {
        Ok(entries) => entries,
        Err(e) => return format!("History unavailable: {}", escape_html(&e.to_string())),
    };

    if entries.is_empty() {
        return "No broadcasts yet.".to_owned();
    }

    let mut lines = vec![format!("<b>Recent broadcasts ({}):</b>", entries.len())];
    for stamped in &entries {
        let record = &stamped.entry;
        lines.push(format!(
            "{} — {}/{} delivered, {} failed, {} photo(s)\n  {}",
            stamped.created_at.format("%Y-%m-%d %H:%M"),
            record.success,
            record.total,
            record.failure,
            record.photo_refs.len(),
            escape_html(&truncate(&record.text, PREVIEW_CHARS)),
        ));
    }
    lines.join("\n")
}

/// Show the most recent reported errors.
pub async fn handle_errors(errors: &ErrorLog) -> String {
    let entries = match errors.recent(LISTING_LIMIT).await {
        Ok(entries) => entries,
        Err(e) => return format!("Error log unavailable: {}", escape_html(&e.to_string())),
    };

    if entries.is_empty() {
        return "No errors recorded.".to_owned();
    }

    let mut lines = vec![format!("<b>Recent errors ({}):</b>", entries.len())];
    for stamped in &entries {
        let record = &stamped.entry;
        lines.push(format!(
            "{} [{}] {}",
            stamped.created_at.format("%Y-%m-%d %H:%M"),
            escape_html(&record.context),
            escape_html(&truncate(&record.message, PREVIEW_CHARS)),
        ));
    }
    lines.join("\n")
}

/// Truncate to `max` characters, appending `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let truncated: String = text.chars().take(max).collect();
        format!("{truncated}...")
    } else {
        text.to_owned()
    }
}
