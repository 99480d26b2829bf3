//! Tests for `src/broadcast/composer.rs`: draft lifecycle and confirmation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use coachbot::broadcast::{
    AllowList, ComposeStart, Composer, ComposerSettings, Composition, ConfirmError, DraftState,
    OperatorNotice, PhotoOutcome, TextOutcome,
};

const OPERATOR: i64 = 42;
const STRANGER: i64 = 7;

fn setup_composer() -> (Composer, mpsc::Receiver<OperatorNotice>) {
    let (tx, rx) = mpsc::channel(8);
    let settings = ComposerSettings {
        album_debounce: Duration::from_millis(700),
        max_photos: 3,
        max_caption_chars: 1024,
    };
    let composer = Composer::new(settings, Arc::new(AllowList::new([OPERATOR])), tx);
    (composer, rx)
}

/// Operator draft holding one single photo, waiting for text.
fn composer_awaiting_text() -> (Composer, mpsc::Receiver<OperatorNotice>) {
    let (composer, rx) = setup_composer();
    composer.start_compose(OPERATOR);
    assert_eq!(
        composer.on_photo(OPERATOR, "photo-1".to_owned(), None),
        PhotoOutcome::ReadyForText { photos: 1 }
    );
    (composer, rx)
}

/// Draft moved to preview with `caption`; returns the draft id on its buttons.
fn preview(composer: &Composer, caption: &str) -> u64 {
    match composer.on_text(OPERATOR, caption) {
        TextOutcome::Preview { draft_id, .. } => draft_id,
        other => panic!("expected a preview, got {other:?}"),
    }
}

fn state_of(composer: &Composer) -> DraftState {
    composer
        .snapshot(OPERATOR)
        .expect("operator should have a draft")
        .state
}

#[test]
fn start_compose_opens_empty_draft_awaiting_photos() {
    let (composer, _rx) = setup_composer();

    assert_eq!(
        composer.start_compose(OPERATOR),
        ComposeStart::Started { replaced: false }
    );

    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.state, DraftState::AwaitingPhotos);
    assert!(snapshot.photos.is_empty());
    assert!(snapshot.text.is_none());
    assert!(snapshot.album_id.is_none());
    assert!(!snapshot.timer_armed);
}

#[test]
fn start_compose_refuses_non_operator() {
    let (composer, _rx) = setup_composer();

    assert_eq!(composer.start_compose(STRANGER), ComposeStart::Unauthorized);
    assert!(composer.snapshot(STRANGER).is_none());
    assert_eq!(composer.draft_count(), 0);
}

#[test]
fn start_compose_twice_replaces_previous_draft() {
    let (composer, _rx) = composer_awaiting_text();

    assert_eq!(
        composer.start_compose(OPERATOR),
        ComposeStart::Started { replaced: true }
    );

    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.state, DraftState::AwaitingPhotos);
    assert!(snapshot.photos.is_empty(), "replacement starts empty");
    assert_eq!(composer.draft_count(), 1);
}

#[test]
fn photo_without_draft_is_reported() {
    let (composer, _rx) = setup_composer();
    assert_eq!(
        composer.on_photo(OPERATOR, "photo-1".to_owned(), None),
        PhotoOutcome::NoDraft
    );
}

#[test]
fn single_photo_moves_straight_to_awaiting_text() {
    let (composer, _rx) = composer_awaiting_text();

    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.state, DraftState::AwaitingText);
    assert_eq!(snapshot.photos, vec!["photo-1".to_owned()]);
    assert!(!snapshot.timer_armed, "single photos never arm a timer");
}

#[test]
fn photo_after_photos_settled_is_not_accepted() {
    let (composer, _rx) = composer_awaiting_text();

    assert_eq!(
        composer.on_photo(OPERATOR, "photo-2".to_owned(), None),
        PhotoOutcome::NotAcceptingPhotos
    );
    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.photos.len(), 1, "draft must be unchanged");
}

#[test]
fn text_without_draft_is_ignored() {
    let (composer, _rx) = setup_composer();
    assert_eq!(composer.on_text(OPERATOR, "hello"), TextOutcome::Ignored);
}

#[test]
fn text_before_photos_asks_for_photos() {
    let (composer, _rx) = setup_composer();
    composer.start_compose(OPERATOR);

    assert_eq!(
        composer.on_text(OPERATOR, "caption first"),
        TextOutcome::PhotosRequired
    );
    assert_eq!(state_of(&composer), DraftState::AwaitingPhotos);
}

#[test]
fn blank_text_is_rejected_and_state_kept() {
    let (composer, _rx) = composer_awaiting_text();

    assert_eq!(composer.on_text(OPERATOR, "   \n\t "), TextOutcome::EmptyText);
    assert_eq!(state_of(&composer), DraftState::AwaitingText);
    assert!(composer
        .snapshot(OPERATOR)
        .expect("draft should exist")
        .text
        .is_none());
}

#[test]
fn text_moves_draft_to_preview_with_trimmed_caption() {
    let (composer, _rx) = composer_awaiting_text();

    let draft_id = composer
        .snapshot(OPERATOR)
        .expect("draft should exist")
        .draft_id;
    let outcome = composer.on_text(OPERATOR, "  Training moved to 7pm  ");
    assert_eq!(
        outcome,
        TextOutcome::Preview {
            draft_id,
            composition: Composition {
                photos: vec!["photo-1".to_owned()],
                text: "Training moved to 7pm".to_owned(),
            },
        }
    );

    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.state, DraftState::Preview);
    assert_eq!(snapshot.text.as_deref(), Some("Training moved to 7pm"));
}

#[test]
fn overlong_caption_is_rejected_and_draft_keeps_waiting() {
    let (composer, _rx) = composer_awaiting_text();

    assert_eq!(
        composer.on_text(OPERATOR, &"x".repeat(2000)),
        TextOutcome::TooLong { max: 1024 }
    );
    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.state, DraftState::AwaitingText);
    assert!(snapshot.text.is_none());

    preview(&composer, "Short enough");
    assert_eq!(state_of(&composer), DraftState::Preview);
}

#[test]
fn caption_limit_counts_characters_not_bytes() {
    let (composer, _rx) = composer_awaiting_text();

    // 1024 characters, 2048 bytes.
    preview(&composer, &"é".repeat(1024));
    assert_eq!(state_of(&composer), DraftState::Preview);
}

#[test]
fn text_during_preview_is_ignored() {
    let (composer, _rx) = composer_awaiting_text();
    composer.on_text(OPERATOR, "first caption");

    assert_eq!(
        composer.on_text(OPERATOR, "second caption"),
        TextOutcome::Ignored
    );
    let snapshot = composer.snapshot(OPERATOR).expect("draft should exist");
    assert_eq!(snapshot.text.as_deref(), Some("first caption"));
}

#[test]
fn confirm_without_draft_fails() {
    let (composer, _rx) = setup_composer();
    assert_eq!(composer.confirm(OPERATOR, 1), Err(ConfirmError::NoDraft));
}

#[test]
fn confirm_before_preview_is_rejected_and_draft_kept() {
    let (composer, _rx) = composer_awaiting_text();
    let draft_id = composer
        .snapshot(OPERATOR)
        .expect("draft should exist")
        .draft_id;

    assert_eq!(
        composer.confirm(OPERATOR, draft_id),
        Err(ConfirmError::NotReady(DraftState::AwaitingText))
    );
    assert_eq!(state_of(&composer), DraftState::AwaitingText);
}

#[test]
fn confirm_in_awaiting_photos_is_rejected() {
    let (composer, _rx) = setup_composer();
    composer.start_compose(OPERATOR);
    let draft_id = composer
        .snapshot(OPERATOR)
        .expect("draft should exist")
        .draft_id;

    assert_eq!(
        composer.confirm(OPERATOR, draft_id),
        Err(ConfirmError::NotReady(DraftState::AwaitingPhotos))
    );
}

#[test]
fn confirm_in_preview_returns_composition_and_destroys_draft() {
    let (composer, _rx) = composer_awaiting_text();
    let draft_id = preview(&composer, "See you Monday");

    let composition = composer
        .confirm(OPERATOR, draft_id)
        .expect("preview should confirm");
    assert_eq!(composition.photos, vec!["photo-1".to_owned()]);
    assert_eq!(composition.text, "See you Monday");
    assert!(!composition.is_album());

    assert!(composer.snapshot(OPERATOR).is_none());
    assert_eq!(
        composer.confirm(OPERATOR, draft_id),
        Err(ConfirmError::NoDraft),
        "a second confirm must not start another broadcast"
    );
}

#[test]
fn cancel_discards_draft() {
    let (composer, _rx) = composer_awaiting_text();

    assert!(composer.cancel(OPERATOR));
    assert!(composer.snapshot(OPERATOR).is_none());
    assert!(!composer.cancel(OPERATOR), "nothing left to cancel");
}

#[test]
fn send_from_replaced_preview_is_rejected_and_new_draft_kept() {
    let (composer, _rx) = composer_awaiting_text();
    let old_id = preview(&composer, "Old caption");

    composer.start_compose(OPERATOR);
    composer.on_photo(OPERATOR, "photo-2".to_owned(), None);
    let new_id = preview(&composer, "New caption");
    assert_ne!(old_id, new_id);

    assert_eq!(
        composer.confirm(OPERATOR, old_id),
        Err(ConfirmError::Stale {
            requested: old_id,
            current: new_id,
        })
    );
    let snapshot = composer.snapshot(OPERATOR).expect("new draft must survive");
    assert_eq!(snapshot.draft_id, new_id);
    assert_eq!(snapshot.state, DraftState::Preview);
    assert_eq!(snapshot.text.as_deref(), Some("New caption"));

    let composition = composer
        .confirm(OPERATOR, new_id)
        .expect("current preview should confirm");
    assert_eq!(composition.photos, vec!["photo-2".to_owned()]);
    assert_eq!(composition.text, "New caption");
}

#[test]
fn cancel_from_replaced_preview_leaves_new_draft() {
    let (composer, _rx) = composer_awaiting_text();
    let old_id = preview(&composer, "Old caption");
    composer.start_compose(OPERATOR);

    assert!(!composer.cancel_draft(OPERATOR, old_id));
    let new_id = composer
        .snapshot(OPERATOR)
        .expect("new draft must survive")
        .draft_id;

    assert!(composer.cancel_draft(OPERATOR, new_id));
    assert!(composer.snapshot(OPERATOR).is_none());
}

#[test]
fn drafts_of_different_operators_are_independent() {
    let (tx, _rx) = mpsc::channel(8);
    let composer = Composer::new(
        ComposerSettings::default(),
        Arc::new(AllowList::new([1, 2])),
        tx,
    );
    composer.start_compose(1);
    composer.start_compose(2);
    composer.on_photo(1, "a".to_owned(), None);

    assert!(composer.cancel(2));
    assert_eq!(
        composer.snapshot(1).expect("first draft should survive").state,
        DraftState::AwaitingText
    );
}

#[test]
fn default_settings_match_documented_defaults() {
    let settings = ComposerSettings::default();
    assert_eq!(settings.album_debounce, Duration::from_millis(700));
    assert_eq!(settings.max_photos, 3);
    assert_eq!(settings.max_caption_chars, 1024);
}
