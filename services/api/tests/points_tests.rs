mod common;

use common::Harness;
use smart_cart_core::domain::{Beacon, LedgerReason, LocationEvent, Position};
use smart_cart_core::ports::{AccountStore, LedgerStore};
use smart_cart_core::CartError;

async fn beacon(h: &Harness, id: &str, x: f64, y: f64) {
    h.store
        .insert_beacon(Beacon {
            id: id.to_string(),
            position: Position { x, y },
        })
        .await;
}

async fn event(h: &Harness, id: &str, beacon_id: &str, radius: f64, enabled: bool, points: u64) {
    h.store
        .insert_event(LocationEvent {
            id: id.to_string(),
            beacon_id: beacon_id.to_string(),
            radius,
            enabled,
            points,
            name: format!("{} event", id),
        })
        .await;
}

#[tokio::test]
async fn ninety_five_units_earn_nine_points() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;

    let accrual = h.state.points.accrue_distance(&alice, 95.0).await.unwrap();

    assert_eq!(accrual.earned_points, 9);
    assert_eq!(accrual.balance, 9);
    assert_eq!(accrual.total_distance, 95.0);
    let entries = h.store.entries_for(&alice).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 9);
    assert_eq!(entries[0].reason, LedgerReason::Distance);
}

#[tokio::test]
async fn short_walks_add_distance_but_no_ledger_entry() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;

    let accrual = h.state.points.accrue_distance(&alice, 5.0).await.unwrap();

    assert_eq!(accrual.earned_points, 0);
    assert_eq!(accrual.balance, 0);
    assert!(h.store.entries_for(&alice).await.unwrap().is_empty());
    let account = h.store.get_account(&alice).await.unwrap();
    assert_eq!(account.total_distance, 5.0);
}

#[tokio::test]
async fn invalid_distances_are_rejected() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    for bad in [-1.0, f64::NAN, f64::INFINITY] {
        let err = h.state.points.accrue_distance(&alice, bad).await.unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
    }
    assert_eq!(h.store.get_account(&alice).await.unwrap().total_distance, 0.0);
}

#[tokio::test]
async fn the_first_event_in_key_order_fires_not_the_nearest() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    beacon(&h, "far", 150.0, 100.0).await;
    beacon(&h, "near", 101.0, 100.0).await;
    event(&h, "a_wide", "far", 60.0, true, 30).await;
    event(&h, "b_close", "near", 5.0, true, 100).await;

    let fired = h
        .state
        .points
        .check_location_event(&alice, Position { x: 100.0, y: 100.0 })
        .await
        .unwrap()
        .expect("an event should fire");

    assert_eq!(fired.event_id, "a_wide");
    assert_eq!(fired.points, 30);
    assert_eq!(fired.balance, 30);
    let entries = h.store.entries_for(&alice).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, LedgerReason::LocationEvent);
    assert_eq!(entries[0].reference.as_deref(), Some("a_wide event"));
}

#[tokio::test]
async fn disabled_events_and_missing_beacons_are_skipped() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    beacon(&h, "near", 101.0, 100.0).await;
    event(&h, "a_disabled", "near", 5.0, false, 500).await;
    event(&h, "b_orphan", "gone", 1000.0, true, 500).await;
    event(&h, "c_live", "near", 5.0, true, 20).await;

    let fired = h
        .state
        .points
        .check_location_event(&alice, Position { x: 100.0, y: 100.0 })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fired.event_id, "c_live");
}

#[tokio::test]
async fn nothing_fires_out_of_range() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;

    let fired = h
        .state
        .points
        .check_location_event(&alice, Position { x: 500.0, y: 500.0 })
        .await
        .unwrap();

    assert!(fired.is_none());
    assert_eq!(h.balance(&alice).await, 0);
}

#[tokio::test]
async fn debit_needs_enough_points() {
    let h = Harness::new().await;
    let alice = h.account_with_points("alice", 20).await;

    let err = h
        .state
        .points
        .debit(&alice, 21, LedgerReason::Purchase, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CartError::InsufficientPoints {
            requested: 21,
            available: 20
        }
    ));
    assert_eq!(h.balance(&alice).await, 20);

    let balance = h
        .state
        .points
        .debit(&alice, 15, LedgerReason::Purchase, Some("ORDER_1_alice".to_string()))
        .await
        .unwrap();
    assert_eq!(balance, 5);
}

#[tokio::test]
async fn concurrent_credits_are_not_lost() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;

    let walks = (0..20).map(|_| h.state.points.accrue_distance(&alice, 10.0));
    futures::future::try_join_all(walks).await.unwrap();

    assert_eq!(h.balance(&alice).await, 20);
    let audit = h.state.points.audit(&alice).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.ledger_sum, 20);
}

#[tokio::test]
async fn history_is_newest_first() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    h.state.points.accrue_distance(&alice, 10.0).await.unwrap();
    h.state.points.accrue_distance(&alice, 30.0).await.unwrap();

    let history = h.state.points.history(&alice).await.unwrap();

    assert_eq!(history.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![3, 1]);
}
