//! Operator-facing delivery summary and the overflow report.
//!
//! The summary lists at most `inline_limit` names per outcome. When either
//! list is longer, or the rendered text would not fit in one Telegram
//! message, the full lists go into a plain-text report that the adapter
//! attaches as a document.

use crate::telegram::ui::escape_html;

use super::DeliveryOutcome;

/// File name used for the overflow report attachment.
pub const OVERFLOW_REPORT_FILE_NAME: &str = "broadcast_report.txt";

/// Telegram's message text limit, counted in UTF-16 code units.
pub const MAX_SUMMARY_LEN: usize = 4096;

const REPORT_NOTE: &str = "Full lists are in the attached report.";

/// Rendered result of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySummary {
    /// HTML summary message.
    pub text: String,
    /// Full plain-text report, present when a list was truncated.
    pub overflow_report: Option<String>,
}

/// Build the summary for `outcome`, truncating name lists to `inline_limit`.
///
/// If the listed names would push the text past [`MAX_SUMMARY_LEN`], the
/// summary falls back to the totals alone and the report carries the names.
pub fn summarize(outcome: &DeliveryOutcome, inline_limit: usize) -> DeliverySummary {
    let mut lines = header_lines(outcome);
    push_names(&mut lines, "Delivered", &outcome.delivered, inline_limit);
    push_names(&mut lines, "Failed", &outcome.failed, inline_limit);

    let overflowed =
        outcome.delivered.len() > inline_limit || outcome.failed.len() > inline_limit;
    if overflowed {
        lines.push(String::new());
        lines.push(REPORT_NOTE.to_owned());
    }

    let text = lines.join("\n");
    if text.encode_utf16().count() <= MAX_SUMMARY_LEN {
        return DeliverySummary {
            text,
            overflow_report: overflowed.then(|| overflow_report(outcome)),
        };
    }

    let mut lines = header_lines(outcome);
    lines.push(String::new());
    lines.push(REPORT_NOTE.to_owned());
    DeliverySummary {
        text: lines.join("\n"),
        overflow_report: Some(overflow_report(outcome)),
    }
}

fn header_lines(outcome: &DeliveryOutcome) -> Vec<String> {
    vec![
        "<b>Broadcast finished</b>".to_owned(),
        format!(
            "Total: {} | Delivered: {} | Failed: {}",
            outcome.total(),
            outcome.success(),
            outcome.failure()
        ),
    ]
}

/// Plain-text report with the complete delivered and failed lists.
///
/// Layout: `Delivered:`, one name per line, a blank line, `Failed:`, one
/// name per line.
pub fn overflow_report(outcome: &DeliveryOutcome) -> String {
    let mut lines = Vec::with_capacity(outcome.total().saturating_add(3));
    lines.push("Delivered:");
    lines.extend(outcome.delivered.iter().map(String::as_str));
    lines.push("");
    lines.push("Failed:");
    lines.extend(outcome.failed.iter().map(String::as_str));
    lines.join("\n")
}

fn push_names(lines: &mut Vec<String>, title: &str, names: &[String], limit: usize) {
    if names.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("<b>{title} ({}):</b>", names.len()));
    lines.extend(names.iter().take(limit).map(|name| escape_html(name)));

    let hidden = names.len().saturating_sub(limit);
    if hidden > 0 {
        lines.push(format!("...and {hidden} more"));
    }
}
