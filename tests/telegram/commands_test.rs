//! Telegram command handler tests.

use std::sync::Arc;

use tokio::sync::mpsc;

use coachbot::broadcast::{AllowList, BroadcastRecord, Composer, ComposerSettings};
use coachbot::error_log::ErrorLog;
use coachbot::ledger::BoundedLedger;
use coachbot::telegram::commands::{
    handle_broadcast, handle_cancel, handle_errors, handle_help, handle_history, truncate,
    LISTING_LIMIT,
};
use coachbot::telegram::ui::UNAUTHORIZED;

const OPERATOR: i64 = 42;

fn setup_composer() -> Composer {
    let (tx, _rx) = mpsc::channel(1);
    Composer::new(
        ComposerSettings::default(),
        Arc::new(AllowList::new([OPERATOR])),
        tx,
    )
}

fn record(text: &str) -> BroadcastRecord {
    BroadcastRecord {
        operator_id: OPERATOR,
        text: text.to_owned(),
        photo_refs: vec!["a".to_owned(), "b".to_owned()],
        total: 25,
        success: 22,
        failure: 3,
    }
}

#[test]
fn help_lists_operator_commands_only_for_operators() {
    let operator_help = handle_help(true);
    assert!(operator_help.contains("/broadcast"));
    assert!(operator_help.contains("/history"));

    let user_help = handle_help(false);
    assert!(!user_help.contains("/broadcast"));
}

#[test]
fn broadcast_command_opens_draft_for_operator() {
    let composer = setup_composer();

    let reply = handle_broadcast(&composer, OPERATOR);

    assert!(reply.contains("New broadcast"));
    assert!(composer.snapshot(OPERATOR).is_some());
}

#[test]
fn broadcast_command_refuses_non_operator() {
    let composer = setup_composer();

    assert_eq!(handle_broadcast(&composer, 7), UNAUTHORIZED);
    assert_eq!(composer.draft_count(), 0);
}

#[test]
fn cancel_command_discards_draft() {
    let composer = setup_composer();
    composer.start_compose(OPERATOR);

    assert_eq!(handle_cancel(&composer, OPERATOR), "Broadcast cancelled.");
    assert_eq!(handle_cancel(&composer, OPERATOR), "Nothing to cancel.");
}

#[tokio::test]
async fn history_reports_empty_ledger() {
    let db = coachbot::db::open_in_memory().await.expect("db should open");
    let ledger: BoundedLedger<BroadcastRecord> = BoundedLedger::new(db, 500);

    assert_eq!(handle_history(&ledger).await, "No broadcasts yet.");
}

#[tokio::test]
async fn history_lists_recent_broadcasts_escaped() {
    let db = coachbot::db::open_in_memory().await.expect("db should open");
    let ledger: BoundedLedger<BroadcastRecord> = BoundedLedger::new(db, 500);
    ledger.append(&record("Bring <gloves> & water")).await;

    let reply = handle_history(&ledger).await;

    assert!(reply.contains("Recent broadcasts (1)"));
    assert!(reply.contains("22/25 delivered, 3 failed, 2 photo(s)"));
    assert!(reply.contains("Bring &lt;gloves&gt; &amp; water"));
}

#[tokio::test]
async fn history_is_capped_at_listing_limit() {
    let db = coachbot::db::open_in_memory().await.expect("db should open");
    let ledger: BoundedLedger<BroadcastRecord> = BoundedLedger::new(db, 500);
    for _ in 0..15 {
        ledger.append(&record("weekly update")).await;
    }

    let reply = handle_history(&ledger).await;

    assert!(reply.contains(&format!("Recent broadcasts ({LISTING_LIMIT})")));
    assert_eq!(reply.matches("weekly update").count(), LISTING_LIMIT);
}

#[tokio::test]
async fn errors_command_lists_reported_errors() {
    let db = coachbot::db::open_in_memory().await.expect("db should open");
    let errors = ErrorLog::new(db, 500);
    assert_eq!(handle_errors(&errors).await, "No errors recorded.");

    errors
        .report("telegram.callback", Some(OPERATOR), &"send failed")
        .await;

    let reply = handle_errors(&errors).await;
    assert!(reply.contains("Recent errors (1)"));
    assert!(reply.contains("[telegram.callback] send failed"));
}

#[test]
fn truncate_shortens_long_text() {
    assert_eq!(truncate("hello world", 5), "hello...");
    assert_eq!(truncate("short", 10), "short");
}

#[test]
fn truncate_counts_characters_not_bytes() {
    assert_eq!(truncate("привет мир", 6), "привет...");
}
