//! Tests for `src/error_log.rs`.

use coachbot::error_log::ErrorLog;

async fn setup_log(capacity: u32) -> ErrorLog {
    let db = coachbot::db::open_in_memory()
        .await
        .expect("in-memory db should open");
    ErrorLog::new(db, capacity)
}

#[tokio::test]
async fn report_persists_full_error_chain() {
    let log = setup_log(10).await;
    let err = anyhow::anyhow!("connection reset").context("failed to send summary");

    log.report("telegram.callback", Some(42), &err).await;

    let entries = log.recent(10).await.expect("recent");
    assert_eq!(entries.len(), 1);
    let record = &entries[0].entry;
    assert_eq!(record.context, "telegram.callback");
    assert_eq!(record.operator_id, Some(42));
    assert_eq!(record.message, "failed to send summary: connection reset");
}

#[tokio::test]
async fn report_without_user_is_recorded() {
    let log = setup_log(10).await;

    log.report("startup", None, &"plain message").await;

    let entries = log.recent(1).await.expect("recent");
    assert_eq!(entries[0].entry.operator_id, None);
    assert_eq!(entries[0].entry.message, "plain message");
}

#[tokio::test]
async fn error_log_is_bounded() {
    let log = setup_log(2).await;
    for context in ["first", "second", "third"] {
        log.report(context, None, &"boom").await;
    }

    let contexts: Vec<String> = log
        .recent(10)
        .await
        .expect("recent")
        .into_iter()
        .map(|stamped| stamped.entry.context)
        .collect();
    assert_eq!(contexts, vec!["third", "second"]);
    assert_eq!(log.ledger().capacity(), 2);
}

fn assert_send<T: Send>(_: T) {}

#[tokio::test]
async fn report_future_is_send() {
    let log = setup_log(10).await;
    let err = anyhow::anyhow!("connection reset");

    // Dispatcher endpoints require `Send` futures.
    assert_send(log.report("telegram.message", Some(42), &err));
    assert_send(log.report("telegram.message", None, &"plain message"));
}
