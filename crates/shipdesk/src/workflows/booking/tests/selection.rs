use super::common::*;
use crate::workflows::booking::selection::{SelectionError, SelectionManager};
use crate::workflows::booking::{BookingError, SessionError};

#[test]
fn toggle_is_idempotent() {
    let mut selection = SelectionManager::new();
    selection.sync_visible(&listing());

    assert!(selection
        .toggle_order(&order_id("101"), true)
        .expect("toggle succeeds"));
    assert!(!selection
        .toggle_order(&order_id("101"), true)
        .expect("repeat toggle succeeds"));
    assert_eq!(selection.selected().len(), 1);

    assert!(selection
        .toggle_order(&order_id("101"), false)
        .expect("removal succeeds"));
    assert!(!selection
        .toggle_order(&order_id("101"), false)
        .expect("repeat removal succeeds"));
    assert!(selection.is_empty());
}

#[test]
fn toggle_rejects_orders_outside_the_listing() {
    let mut selection = SelectionManager::new();
    selection.sync_visible(&listing());

    match selection.toggle_order(&order_id("999"), true) {
        Err(SelectionError::UnknownOrders(unknown)) => {
            assert_eq!(unknown, vec![order_id("999")]);
        }
        other => panic!("expected unknown order error, got {other:?}"),
    }
}

#[test]
fn select_all_replaces_wholesale() {
    let mut selection = SelectionManager::new();
    selection.sync_visible(&listing());

    selection
        .select_all(&[order_id("101"), order_id("102")])
        .expect("listed orders select");
    selection
        .select_all(&[order_id("103")])
        .expect("replacement selects");

    assert_eq!(selection.selected().len(), 1);
    assert!(selection.contains(&order_id("103")));
}

#[test]
fn select_all_enumerates_unknown_orders() {
    let mut selection = SelectionManager::new();
    selection.sync_visible(&listing());

    match selection.select_all(&[order_id("101"), order_id("888"), order_id("999")]) {
        Err(SelectionError::UnknownOrders(unknown)) => {
            assert_eq!(unknown, vec![order_id("888"), order_id("999")]);
        }
        other => panic!("expected unknown order error, got {other:?}"),
    }
    assert!(selection.is_empty(), "failed select_all must not apply");
}

#[test]
fn refreshing_the_listing_prunes_the_selection() {
    let mut selection = SelectionManager::new();
    selection.sync_visible(&listing());
    selection
        .select_all(&[order_id("101"), order_id("102")])
        .expect("listed orders select");

    let changed = selection.sync_visible(&[order_ref("101"), order_ref("103")]);

    assert!(changed);
    assert_eq!(selection.selected().len(), 1);
    assert!(selection.contains(&order_id("101")));
}

#[tokio::test]
async fn selection_change_discards_the_active_session() {
    let (batch, _gateway) = ready_batch(StubGateway::with_sheet(standard_sheet()));
    batch
        .create_session(warehouse(), rto())
        .await
        .expect("session creates");

    batch
        .toggle_order(&order_id("103"), false)
        .expect("toggle succeeds");

    match batch.fetch_rates().await {
        Err(BookingError::Session(SessionError::NoActiveSession)) => {}
        other => panic!("expected no active session, got {other:?}"),
    }
}

#[tokio::test]
async fn noop_toggle_keeps_the_session() {
    let (batch, _gateway) = ready_batch(StubGateway::with_sheet(standard_sheet()));
    batch
        .create_session(warehouse(), rto())
        .await
        .expect("session creates");

    batch
        .toggle_order(&order_id("101"), true)
        .expect("idempotent toggle succeeds");

    batch.fetch_rates().await.expect("session survives");
}
