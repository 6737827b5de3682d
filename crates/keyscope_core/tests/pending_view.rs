use keyscope_core::{
    IdleTimeFormat, NO_MESSAGES_CLAIMED, NotificationKind, PendingView, StreamEntryId, StreamTab,
    TaskKind,
};
use keyscope_test_support::{FakeStreamApi, fixtures};

fn api() -> FakeStreamApi {
    FakeStreamApi::new()
        .with_group("billing")
        .with_consumer("billing", "worker-1")
        .with_consumer("billing", "worker-2")
        .with_consumer("billing", "worker-3")
        .with_pending(
            "billing",
            fixtures::pending_message("1700000000000-0", "worker-1", 5_000),
        )
        .with_pending(
            "billing",
            fixtures::pending_message("1700000000001-0", "worker-1", 90_000),
        )
}

fn opened(api: FakeStreamApi) -> PendingView<FakeStreamApi> {
    let mut view = PendingView::new(api, "orders", 500);
    assert!(view.open());
    assert!(view.select_group("billing"));
    assert!(view.select_consumer("worker-1"));
    view
}

fn entry_ids(view: &PendingView<FakeStreamApi>) -> Vec<StreamEntryId> {
    view.messages().iter().map(|m| m.id).collect()
}

#[test]
fn navigates_from_groups_to_pending_entries() {
    let mut view = PendingView::new(api(), "orders", 500);

    assert!(view.open());
    assert_eq!(view.tab(), StreamTab::Groups);
    assert_eq!(view.groups()[0].consumers, 3);
    assert_eq!(view.groups()[0].pending, 2);

    assert!(view.select_group("billing"));
    assert_eq!(view.tab(), StreamTab::Consumers);
    assert_eq!(view.consumers()[0].pending, 2);
    assert_eq!(view.columns()[0].label, "Consumer Name");

    assert!(view.select_consumer("worker-1"));
    assert_eq!(view.tab(), StreamTab::Pending);
    assert_eq!(view.messages().len(), 2);

    let labels: Vec<String> = view.columns().into_iter().map(|c| c.label).collect();
    assert_eq!(
        labels,
        vec!["Entry ID", "Last Message Delivered", "Times Message Delivered"]
    );

    view.show_groups();
    assert_eq!(view.tab(), StreamTab::Groups);
    assert_eq!(view.selected_consumer(), None);
}

#[test]
fn claim_destinations_exclude_the_current_consumer() {
    let view = opened(api());

    assert_eq!(view.claim_destinations(), vec!["worker-2", "worker-3"]);
}

#[test]
fn claim_below_min_idle_time_changes_nothing() {
    let mut view = opened(api());
    let before = entry_ids(&view);
    let reloads = view.api().pending_requests().len();

    let request = view.claim_request("worker-2", 100_000_000, before.clone());
    let outcome = view.claim(&request);

    assert_eq!(outcome.map(|o| o.affected.len()), Some(0));
    assert_eq!(entry_ids(&view), before);
    assert_eq!(view.api().pending_requests().len(), reloads);

    let notifications = view.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Info);
    assert_eq!(notifications[0].title, NO_MESSAGES_CLAIMED);
}

#[test]
fn successful_claim_reloads_the_pending_list() {
    let mut view = opened(api());

    let request = view
        .claim_request("worker-2", 60_000, entry_ids(&view))
        .with_idle(0, IdleTimeFormat::RelativeTime)
        .with_retry_count(3);
    let outcome = view.claim(&request);

    assert_eq!(
        outcome.map(|o| o.affected),
        Some(vec![StreamEntryId::new(1_700_000_000_001, 0)])
    );
    assert_eq!(entry_ids(&view), vec![StreamEntryId::new(1_700_000_000_000, 0)]);

    let notifications = view.take_notifications();
    assert_eq!(notifications[0].kind, NotificationKind::Success);

    let claims = view.api().claims();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].consumer_name, "worker-2");
    assert_eq!(claims[0].retry_count, Some(3));
    assert!(!view.tasks().has_running(TaskKind::ClaimMessages));
}

#[test]
fn invalid_claims_are_rejected_locally() {
    let mut view = opened(api());

    let request = view.claim_request("worker-2", 0, Vec::new());

    assert_eq!(view.claim(&request), None);
    assert!(view.api().claims().is_empty());
    assert_eq!(view.take_notifications()[0].kind, NotificationKind::Error);
}

#[test]
fn server_errors_become_notifications() {
    let mut view = PendingView::new(api().with_error("NOGROUP No such key"), "orders", 500);

    assert!(!view.open());

    assert!(view.last_error().is_some_and(|e| e.contains("NOGROUP")));
    let notifications = view.take_notifications();
    assert_eq!(notifications[0].title, "Stream request failed");
}
