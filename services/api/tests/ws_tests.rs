mod common;

use api_lib::web::{follow_ownership, release_on_disconnect};
use axum::extract::ws::Message;
use common::{Harness, COLA};
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use smart_cart_core::ports::{AccountStore, CartStore};
use smart_cart_core::OwnershipEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Runs the ownership feed for `account` on `cart_id` while `change` mutates
/// the store, and returns the ending event plus every message sent.
async fn feed_until<F>(
    h: &Harness,
    account: &str,
    cart_id: &str,
    token: &CancellationToken,
    change: F,
) -> (Option<OwnershipEvent>, Vec<Value>)
where
    F: std::future::Future<Output = ()>,
{
    let events = h
        .state
        .sessions
        .watch_ownership_as(account, cart_id)
        .await
        .unwrap();
    let (tx, rx) = mpsc::unbounded::<Message>();
    let sender = Arc::new(Mutex::new(tx));

    let change = async {
        tokio::task::yield_now().await;
        change.await;
    };
    let (ended, ()) = tokio::time::timeout(
        Duration::from_secs(1),
        async { tokio::join!(follow_ownership(events, &sender, account, cart_id, token), change) },
    )
    .await
    .expect("the feed did not end");

    drop(sender);
    let sent = rx
        .map(|msg| match msg {
            Message::Text(text) => serde_json::from_str::<Value>(text.as_str()).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        })
        .collect()
        .await;
    (ended, sent)
}

fn empty_view(cart_id: &str) -> Value {
    json!({ "type": "cart_view", "view": { "cart_id": cart_id, "lines": [], "total": 0 } })
}

#[tokio::test]
async fn a_hijack_sends_the_notice_then_an_empty_view_and_ends_the_feed() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    h.state.sessions.bind_cart(&alice, "3").await.unwrap();
    h.state.inventory.record_detection("3", COLA, 2).await.unwrap();
    let token = CancellationToken::new();

    let (ended, sent) = feed_until(&h, &alice, "3", &token, async {
        h.store.assign_owner("3", "mallory").await.unwrap();
    })
    .await;

    assert_eq!(
        ended,
        Some(OwnershipEvent::Hijacked {
            owner: "mallory".to_string()
        })
    );
    assert!(token.is_cancelled());
    assert_eq!(
        sent,
        vec![json!({ "type": "hijacked", "cart_id": "3" }), empty_view("3")]
    );

    // The disconnect cleanup that follows must not take the cart back.
    release_on_disconnect(&h.state, &alice).await;
    let cart = h.store.get_cart("3").await.unwrap();
    assert_eq!(cart.owner_account_id.as_deref(), Some("mallory"));
    assert_eq!(h.store.list_items("3").await.unwrap().len(), 1);
    assert!(h.store.get_account(&alice).await.unwrap().bound_cart_id.is_none());
}

#[tokio::test]
async fn a_removed_cart_is_reported_like_a_hijack() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    h.state.sessions.bind_cart(&alice, "4").await.unwrap();
    let token = CancellationToken::new();

    let (ended, sent) = feed_until(&h, &alice, "4", &token, async {
        h.store.delete_cart("4").await;
    })
    .await;

    assert_eq!(ended, Some(OwnershipEvent::Removed));
    assert!(token.is_cancelled());
    assert_eq!(
        sent,
        vec![json!({ "type": "cart_removed", "cart_id": "4" }), empty_view("4")]
    );
}

#[tokio::test]
async fn a_plain_release_ends_the_feed_without_an_empty_view() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    h.state.sessions.bind_cart(&alice, "5").await.unwrap();
    let token = CancellationToken::new();

    let (ended, sent) = feed_until(&h, &alice, "5", &token, async {
        h.state.sessions.release_cart("5").await.unwrap();
    })
    .await;

    assert_eq!(ended, Some(OwnershipEvent::Released));
    assert_eq!(sent, vec![json!({ "type": "released", "cart_id": "5" })]);
}

#[tokio::test]
async fn a_cancelled_feed_sends_nothing() {
    let h = Harness::new().await;
    let alice = h.account("alice").await;
    h.state.sessions.bind_cart(&alice, "6").await.unwrap();
    let token = CancellationToken::new();

    let (ended, sent) = feed_until(&h, &alice, "6", &token, async {
        token.cancel();
    })
    .await;

    assert_eq!(ended, None);
    assert!(sent.is_empty());
    assert!(h.state.sessions.binding("6").await.unwrap().in_use);

    // Without a hijack, the disconnect cleanup releases the caller's cart.
    release_on_disconnect(&h.state, &alice).await;
    assert!(!h.state.sessions.binding("6").await.unwrap().in_use);
}
