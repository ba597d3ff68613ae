//! End-to-end tests for the conversation pipeline: live feed in, merged
//! snapshots out.

use braid_events::{ErrorDetail, ErrorSource, ItemSnapshot, ItemStatus, RawEvent, Role};
use braid_store::{ConversationStore, SessionArchive, SessionState, StoreHandle};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An item streams in live, then the durable snapshot catches up with the
/// completed form: the merged output holds exactly one item with final
/// text, no streaming flag, and the live-computed duration.
#[test]
fn streaming_to_durable_handoff() {
    init_tracing();
    let mut store = ConversationStore::new();
    store.set_session("task-7");

    store.apply_live_event(
        &RawEvent::added(ItemSnapshot::new("m1", "message"), 1)
            .with_timestamp("2025-06-01T09:00:00Z"),
    );
    store.apply_live_event(&RawEvent::text_delta("m1", 2, "Wor"));
    store.apply_live_event(&RawEvent::text_delta("m1", 3, "king..."));

    {
        let conversation = store.conversation();
        assert_eq!(conversation.len(), 1);
        assert!(conversation[0].is_streaming);
        assert_eq!(conversation[0].text(), "Working...");
    }

    store.apply_live_event(
        &RawEvent::done_by_id("m1", 4)
            .with_text("Work finished.")
            .with_timestamp("2025-06-01T09:00:12Z"),
    );

    // Durable snapshot arrives later with the item already completed
    store.set_state(Some(SessionState {
        events: vec![
            RawEvent::added(ItemSnapshot::new("m1", "message"), 1),
            RawEvent::done(
                ItemSnapshot::message("m1", Role::Assistant, "Work finished."),
                2,
            ),
        ],
    }));

    let conversation = store.conversation();
    assert_eq!(conversation.len(), 1);
    let item = &conversation[0];
    assert_eq!(item.text(), "Work finished.");
    assert!(!item.is_streaming);
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.duration_seconds, Some(12));
}

/// Feeding the same inputs twice yields identical output both times.
#[test]
fn idempotent_replay() {
    init_tracing();
    let live = vec![
        RawEvent::added(ItemSnapshot::new("a", "message"), 1),
        RawEvent::text_delta("a", 2, "Hel"),
        RawEvent::text_delta("a", 3, "lo"),
        RawEvent::done_by_id("a", 4).with_text("Hello"),
        RawEvent::added(ItemSnapshot::new("t", "mcp_call"), 5),
    ];
    let state = SessionState {
        events: vec![
            RawEvent::added(ItemSnapshot::new("a", "message"), 1),
            RawEvent::done(ItemSnapshot::message("a", Role::Assistant, "Hello"), 2),
        ],
    };

    let mut store = ConversationStore::new();
    store.set_state(Some(state.clone()));
    store.apply_live_events(live.iter());
    let first = store.conversation();

    store.set_state(Some(state));
    store.apply_live_events(live.iter());
    let second = store.conversation();

    assert_eq!(first, second);
}

/// The canonical assembly scenario: added, shuffled deltas, done with the
/// authoritative full text.
#[test]
fn done_text_overrides_buffered_fragments() {
    init_tracing();
    let mut store = ConversationStore::new();
    store.apply_live_events(
        [
            RawEvent::added(ItemSnapshot::new("A", "message"), 1),
            RawEvent::text_delta("A", 2, "Hel"),
            RawEvent::text_delta("A", 3, "lo"),
            RawEvent::done_by_id("A", 4).with_text("Hello"),
        ]
        .iter(),
    );

    let conversation = store.conversation();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation[0].text(), "Hello");
    assert!(!conversation[0].is_streaming);
}

/// A failure with no preceding added still materializes a terminal item
/// carrying the error.
#[test]
fn failed_without_added_is_robust() {
    init_tracing();
    let mut store = ConversationStore::new();
    store.apply_live_event(&RawEvent::failed(
        "B",
        1,
        ErrorDetail::new(ErrorSource::Backend, "timeout"),
    ));

    let conversation = store.conversation();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation[0].status, ItemStatus::Failed);
    assert_eq!(conversation[0].error.as_ref().unwrap().message, "timeout");
}

/// With no live feed and no active state, a persisted archive renders
/// verbatim with nothing marked streaming.
#[test]
fn archive_fallback_for_completed_session() {
    init_tracing();
    let mut events = Vec::new();
    for (i, id) in ["h1", "h2", "h3", "h4", "h5"].iter().enumerate() {
        let seq = (i as u64) * 2 + 1;
        events.push(RawEvent::added(ItemSnapshot::new(*id, "message"), seq));
        events.push(RawEvent::done(
            ItemSnapshot::message(*id, Role::Assistant, "archived"),
            seq + 1,
        ));
    }

    let mut store = ConversationStore::new();
    store.set_archive(Some(SessionArchive {
        events,
        ..Default::default()
    }));

    let conversation = store.conversation();
    assert_eq!(conversation.len(), 5);
    assert!(conversation.iter().all(|i| !i.is_streaming));
    assert!(conversation.iter().all(|i| i.status == ItemStatus::Completed));
}

/// Switching sessions wipes every trace of the previous one.
#[test]
fn session_switch_clears_all_state() {
    init_tracing();
    let mut store = ConversationStore::new();
    store.set_session("old");
    store.apply_live_events(
        [
            RawEvent::added(ItemSnapshot::new("old-item", "message"), 1),
            RawEvent::text_delta("old-item", 2, "old text"),
        ]
        .iter(),
    );
    assert_eq!(store.conversation().len(), 1);

    store.set_session("new");
    assert!(store.conversation().is_empty());
    assert!(
        !store.conversation().iter().any(|i| i.id == "old-item"),
        "old-session items must not survive the switch"
    );
}

/// A tool call that fails mid-run keeps later items flowing.
#[test]
fn tool_failure_does_not_stop_processing() {
    init_tracing();
    let mut store = ConversationStore::new();
    store.apply_live_events(
        [
            RawEvent::added(ItemSnapshot::new("tool-1", "mcp_call"), 1),
            RawEvent::failed(
                "tool-1",
                2,
                ErrorDetail::new(ErrorSource::Mcp, "server unreachable"),
            ),
            RawEvent::added(ItemSnapshot::new("m2", "message"), 3),
            RawEvent::text_delta("m2", 4, "continuing"),
        ]
        .iter(),
    );

    let conversation = store.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].status, ItemStatus::Failed);
    assert_eq!(conversation[1].text(), "continuing");
    assert!(conversation[1].is_streaming);
}

/// Full reactive path through a shared handle: producer pushes, consumer
/// awaits changes, late subscriber replays.
#[tokio::test]
async fn reactive_flow_through_handle() {
    init_tracing();
    let handle = StoreHandle::default();
    let mut rx = handle.subscribe();
    rx.borrow_and_update();

    let producer = handle.clone();
    producer.apply_live_event(&RawEvent::added(ItemSnapshot::new("a", "message"), 1));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().len(), 1);

    producer.apply_live_event(&RawEvent::text_delta("a", 2, "hi"));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update()[0].text(), "hi");

    // A duplicate delivery produces no wakeup
    producer.apply_live_event(&RawEvent::text_delta("a", 2, "hi"));
    assert!(!rx.has_changed().unwrap());

    // Late join sees the current state immediately
    let late = handle.subscribe();
    assert_eq!(late.borrow()[0].text(), "hi");
}

/// An approval decision patched from outside the event flow re-triggers
/// publication.
#[tokio::test]
async fn approval_patch_notifies_subscribers() {
    init_tracing();
    let handle = StoreHandle::default();
    handle.set_state(Some(SessionState {
        events: vec![RawEvent::added(
            ItemSnapshot::new("appr-1", "approval_request"),
            1,
        )],
    }));

    let mut rx = handle.subscribe();
    rx.borrow_and_update();

    handle
        .update_item_status("appr-1", ItemStatus::Completed)
        .unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow()[0].status, ItemStatus::Completed);
}
