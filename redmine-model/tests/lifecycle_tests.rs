mod common;

use common::{FakeTracker, attrs, registry, valid_attrs, watcher_registry};
use pretty_assertions::assert_eq;
use redmine_model::{Attributes, Ticket, TicketError, TicketState, ViolationKind};
use serde_json::json;
use std::sync::atomic::Ordering;

fn created_ticket(tracker: &FakeTracker) -> Ticket {
    let mut ticket = Ticket::new(registry());
    ticket.create(tracker, valid_attrs()).unwrap();
    ticket
}

// ── create ───────────────────────────────────────────────────────

#[test]
fn create_persists_and_loads_server_fields() {
    let tracker = FakeTracker::new();
    let ticket = created_ticket(&tracker);

    assert_eq!(ticket.id(), Some(52));
    assert_eq!(ticket.state(), TicketState::Persisted);
    assert_eq!(ticket.get_str("status_name"), Some("新規"));
    assert_eq!(ticket.get_str("author_name"), Some("api redmine"));
    assert_eq!(ticket.get_str("tracker_name"), Some("tracker #5"));
    assert_eq!(ticket.get_str("course"), Some("Bコース"));
    assert!(ticket.unmatched().fields.contains_key("created_on"));
    assert!(tracker.contains(52));
}

#[test]
fn create_sends_the_wire_payload() {
    let tracker = FakeTracker::new();
    created_ticket(&tracker);

    assert_eq!(
        tracker.last_payload().unwrap(),
        json!({
            "issue": {
                "project_id": 4,
                "tracker_id": 5,
                "priority_id": 2,
                "subject": "テストサブジェクト",
                "description": "詳細内容",
                "custom_fields": [{ "id": 21, "value": "Bコース" }]
            }
        })
    );
}

#[test]
fn create_sends_watchers_and_skips_the_values_check() {
    let tracker = FakeTracker::new();
    let mut ticket = Ticket::new(watcher_registry());
    ticket
        .create(
            &tracker,
            attrs(json!({
                "subject": "テスト",
                "watcher_user_ids": ["1", "2"],
                "course": "Zコース",
            })),
        )
        .unwrap();

    assert_eq!(
        tracker.last_payload().unwrap()["issue"]["watcher_user_ids"],
        json!([1, 2])
    );
    assert_eq!(ticket.state(), TicketState::Persisted);
    assert_eq!(ticket.get("watcher_user_ids"), Some(&json!([1, 2])));
    assert_eq!(ticket.get_str("course"), Some("Zコース"));
}

#[test]
fn invalid_ticket_is_never_sent() {
    let tracker = FakeTracker::new();
    let mut ticket = Ticket::new(registry());

    let err = ticket
        .create(&tracker, attrs(json!({ "subject": "x", "course": "Gコース" })))
        .unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert!(errors.has("course", ViolationKind::Value));
    assert_eq!(ticket.errors(), errors);
    assert_eq!(ticket.state(), TicketState::New);
    assert_eq!(ticket.id(), None);
    assert_eq!(tracker.create_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn create_with_unknown_attribute_fails_before_validation() {
    let tracker = FakeTracker::new();
    let mut ticket = Ticket::new(registry());
    let err = ticket
        .create(&tracker, attrs(json!({ "nope": 1 })))
        .unwrap_err();
    assert!(matches!(err, TicketError::UnknownField(_)));
    assert_eq!(tracker.create_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn transport_failure_leaves_ticket_unsaved() {
    let tracker = FakeTracker::new();
    tracker.fail_creates_with(422, "Subject cannot be blank");
    let mut ticket = Ticket::new(registry());

    let err = ticket.create(&tracker, valid_attrs()).unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert_eq!(ticket.id(), None);
    assert_eq!(ticket.state(), TicketState::Validated);
    assert_eq!(ticket.get_str("subject"), Some("テストサブジェクト"));
}

#[test]
fn save_creates_with_current_values() {
    let tracker = FakeTracker::new();
    let mut ticket = Ticket::with_attributes(registry(), valid_attrs()).unwrap();
    ticket.save(&tracker).unwrap();
    assert_eq!(ticket.id(), Some(52));
}

#[test]
fn persisted_ticket_cannot_be_created_again() {
    let tracker = FakeTracker::new();
    let mut ticket = created_ticket(&tracker);

    let err = ticket.create(&tracker, Attributes::new()).unwrap_err();
    assert!(matches!(err, TicketError::IllegalState(_)));
    assert_eq!(tracker.create_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn transport_as_trait_object() {
    let tracker = FakeTracker::new();
    let transport: &dyn redmine_model::TicketTransport = &tracker;
    let mut ticket = Ticket::new(registry());
    ticket.create(transport, valid_attrs()).unwrap();
    assert_eq!(ticket.state(), TicketState::Persisted);
}

// ── find ─────────────────────────────────────────────────────────

#[test]
fn find_loads_an_existing_issue() {
    let tracker = FakeTracker::new();
    tracker.insert(
        2,
        json!({
            "issue": {
                "id": 2,
                "subject": "テスト",
                "custom_fields": [{ "id": 21, "value": "Bコース" }, { "id": 999, "value": "x" }]
            }
        }),
    );

    let mut ticket = Ticket::new(registry());
    ticket.find(&tracker, 2).unwrap();

    assert_eq!(ticket.id(), Some(2));
    assert_eq!(ticket.state(), TicketState::Persisted);
    assert_eq!(ticket.get_str("subject"), Some("テスト"));
    assert_eq!(ticket.get_str("course"), Some("Bコース"));
    assert!(ticket.unmatched().custom_fields.contains_key(&999));
    // the configured project id is not kept when the tracker omits it
    assert_eq!(ticket.get("project_id"), None);
}

#[test]
fn find_uses_requested_id_when_document_has_none() {
    let tracker = FakeTracker::new();
    tracker.insert(9, json!({ "issue": { "subject": "idなし" } }));

    let mut ticket = Ticket::new(registry());
    ticket.find(&tracker, 9).unwrap();
    assert_eq!(ticket.id(), Some(9));
}

#[test]
fn find_missing_issue_changes_nothing() {
    let tracker = FakeTracker::new();
    let mut ticket = Ticket::with_attributes(registry(), valid_attrs()).unwrap();
    let before = ticket.values().clone();

    let err = ticket.find(&tracker, 404).unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(ticket.values(), &before);
    assert_eq!(ticket.state(), TicketState::New);
}

#[test]
fn find_rejects_malformed_documents() {
    let tracker = FakeTracker::new();
    tracker.insert(3, json!({ "issues": [] }));

    let mut ticket = Ticket::new(registry());
    let err = ticket.find(&tracker, 3).unwrap_err();
    assert!(matches!(err, TicketError::MalformedDocument(_)));
    assert_eq!(ticket.id(), None);
}

#[test]
fn find_after_create_reloads() {
    let tracker = FakeTracker::new();
    let created = created_ticket(&tracker);

    let mut loaded = Ticket::new(registry());
    loaded.find(&tracker, created.id().unwrap()).unwrap();
    assert_eq!(loaded.values(), created.values());
}

// ── delete ───────────────────────────────────────────────────────

#[test]
fn delete_own_id() {
    let tracker = FakeTracker::new();
    let mut ticket = created_ticket(&tracker);

    assert!(ticket.delete(&tracker, None).unwrap());
    assert_eq!(ticket.state(), TicketState::Deleted);
    assert!(!tracker.contains(52));
    assert_eq!(ticket.get_str("subject"), Some("テストサブジェクト"));
}

#[test]
fn delete_without_any_id_is_illegal() {
    let tracker = FakeTracker::new();
    let mut ticket = Ticket::new(registry());

    let err = ticket.delete(&tracker, None).unwrap_err();
    assert!(matches!(err, TicketError::IllegalState(_)));
    assert_eq!(tracker.delete_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn delete_other_id_keeps_this_ticket() {
    let tracker = FakeTracker::new();
    tracker.insert(7, json!({ "issue": { "id": 7 } }));
    let mut ticket = Ticket::new(registry());

    assert!(ticket.delete(&tracker, Some(7)).unwrap());
    assert_eq!(ticket.state(), TicketState::New);
    assert!(!tracker.contains(7));
}

#[test]
fn unconfirmed_delete_returns_false() {
    let tracker = FakeTracker::new();
    let mut ticket = created_ticket(&tracker);

    assert!(!ticket.delete(&tracker, Some(1000)).unwrap());
    assert_eq!(ticket.state(), TicketState::Persisted);
}

#[test]
fn deleted_ticket_is_terminal() {
    let tracker = FakeTracker::new();
    let mut ticket = created_ticket(&tracker);
    ticket.delete(&tracker, None).unwrap();

    assert!(matches!(
        ticket.delete(&tracker, None),
        Err(TicketError::IllegalState(_))
    ));
    assert!(matches!(
        ticket.find(&tracker, 52),
        Err(TicketError::IllegalState(_))
    ));
    assert!(matches!(
        ticket.create(&tracker, valid_attrs()),
        Err(TicketError::IllegalState(_))
    ));
    assert_eq!(tracker.fetch_calls.load(Ordering::SeqCst), 0);
}
