//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a live cart connection.
//! After the client names the cart it owns, two forwarding tasks push the
//! priced cart view and watch for ownership changes, while the main loop
//! handles item edits and logout. Any exit path ends with a best-effort
//! release of the caller's cart.

use crate::{
    error::ApiError,
    web::{
        dto::CartViewDto,
        middleware::Caller,
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    Sink, SinkExt, Stream,
};
use smart_cart_core::{CartError, OwnershipEvent, PortResult, PricedCartView};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, caller.0))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, account_id: String) {
    info!(account_id = %account_id, "New WebSocket connection established.");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Watch Phase ---
    let cart_id = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Watch { cart_id }) => cart_id,
            _ => {
                warn!(account_id = %account_id, "First message was not a valid watch message.");
                let err = ApiError::Cart(CartError::Validation(
                    "the first message must be a watch message".to_string(),
                ));
                send_error(&ws_sender, &err).await;
                return;
            }
        },
        _ => {
            info!(account_id = %account_id, "Client disconnected before sending a watch message.");
            return;
        }
    };

    match app_state.sessions.binding(&cart_id).await {
        Ok(binding) if binding.owner_account_id.as_deref() == Some(account_id.as_str()) => {}
        Ok(_) => {
            warn!(account_id = %account_id, cart_id = %cart_id, "Watch rejected: cart is not bound to the caller.");
            let err = ApiError::Forbidden(format!("cart {} is not bound to this account", cart_id));
            send_error(&ws_sender, &err).await;
            return;
        }
        Err(e) => {
            send_error(&ws_sender, &ApiError::from(e)).await;
            return;
        }
    }

    if !send_message(&ws_sender, &ServerMessage::Watching { cart_id: cart_id.clone() }).await {
        error!("Failed to send watching message.");
        return;
    }

    let token = CancellationToken::new();
    let view_task = tokio::spawn(forward_views(
        app_state.clone(),
        cart_id.clone(),
        ws_sender.clone(),
        token.clone(),
    ));
    let ownership_task = tokio::spawn(watch_ownership(
        app_state.clone(),
        account_id.clone(),
        cart_id.clone(),
        ws_sender.clone(),
        token.clone(),
    ));

    // --- 2. Main Message Loop ---
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let keep_going = handle_text_message(
                        text.as_str(),
                        &app_state,
                        &account_id,
                        &cart_id,
                        &ws_sender,
                        &token,
                    )
                    .await;
                    if !keep_going {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket transport error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            }
        }
    }

    // --- 3. Cleanup ---
    token.cancel();
    let _ = view_task.await;
    let _ = ownership_task.await;

    release_on_disconnect(&app_state, &account_id).await;
    let _ = ws_sender.lock().await.close().await;
    info!("WebSocket connection closed.");
}

/// Ends the caller's session after the connection is gone. Runs at most once
/// per connection; failures are logged and never retried. A cart that has
/// changed hands stays with its new owner.
pub async fn release_on_disconnect(app_state: &AppState, account_id: &str) {
    match app_state.sessions.end_session(account_id).await {
        Ok(Some(binding)) => info!(account_id, cart_id = %binding.cart_id, "Cart released on disconnect."),
        Ok(None) => {}
        Err(e) => error!(account_id, "Best-effort cart release failed: {}", e),
    }
}

/// Handles one client text message. Returns `false` when the connection should end.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    account_id: &str,
    cart_id: &str,
    ws_sender: &WsSender,
    token: &CancellationToken,
) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SetQuantity { barcode, quantity }) => {
            if let Err(e) = app_state
                .inventory
                .set_quantity(cart_id, &barcode, quantity)
                .await
            {
                send_error(ws_sender, &ApiError::from(e)).await;
            }
        }
        Ok(ClientMessage::RemoveItem { barcode }) => {
            if let Err(e) = app_state.inventory.remove_item(cart_id, &barcode).await {
                send_error(ws_sender, &ApiError::from(e)).await;
            }
        }
        Ok(ClientMessage::Logout) => {
            info!(account_id, "Logout received.");
            // Stop the forwarders first so the release is reported only once.
            token.cancel();
            match app_state.sessions.end_session(account_id).await {
                Ok(_) => {
                    let released = ServerMessage::Released {
                        cart_id: cart_id.to_string(),
                    };
                    send_message(ws_sender, &released).await;
                }
                Err(e) => send_error(ws_sender, &ApiError::from(e)).await,
            }
            return false;
        }
        Ok(ClientMessage::Watch { .. }) => {
            warn!("Received subsequent watch message, which is ignored.");
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
    true
}

/// Pushes a fresh priced view on every change to the cart's items.
async fn forward_views(
    app_state: Arc<AppState>,
    cart_id: String,
    ws_sender: WsSender,
    token: CancellationToken,
) {
    let mut views = match app_state.inventory.watch_cart(&cart_id).await {
        Ok(views) => views,
        Err(e) => {
            error!(cart_id = %cart_id, "Failed to subscribe to cart items: {}", e);
            token.cancel();
            return;
        }
    };

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            next = views.next() => match next {
                Some(Ok(view)) => {
                    let msg = ServerMessage::CartView { view: view.into() };
                    if !send_message(&ws_sender, &msg).await {
                        token.cancel();
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!(cart_id = %cart_id, "Cart view stream failed: {}", e);
                    token.cancel();
                    break;
                }
                None => break,
            }
        }
    }
}

/// Ends the connection once the caller no longer owns the cart.
async fn watch_ownership(
    app_state: Arc<AppState>,
    account_id: String,
    cart_id: String,
    ws_sender: WsSender,
    token: CancellationToken,
) {
    let events = match app_state
        .sessions
        .watch_ownership_as(&account_id, &cart_id)
        .await
    {
        Ok(events) => events,
        Err(e) => {
            error!(cart_id = %cart_id, "Failed to subscribe to cart ownership: {}", e);
            token.cancel();
            return;
        }
    };
    follow_ownership(events, &ws_sender, &account_id, &cart_id, &token).await;
}

/// Follows `events` until the caller stops owning the cart, then cancels
/// `token` and sends the closing notice. A hijack or removal is followed by
/// an empty cart view so the client drops what it was showing.
///
/// Returns the event that ended the feed, or `None` if the feed was cancelled
/// or the stream ended first.
pub async fn follow_ownership<E, S>(
    mut events: E,
    ws_sender: &Arc<Mutex<S>>,
    account_id: &str,
    cart_id: &str,
    token: &CancellationToken,
) -> Option<OwnershipEvent>
where
    E: Stream<Item = PortResult<OwnershipEvent>> + Unpin,
    S: Sink<Message> + Unpin,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => return None,
            next = events.next() => match next {
                Some(Ok(OwnershipEvent::Owned)) => {}
                Some(Ok(event)) => {
                    // Cancel before sending so no stale view follows the final one.
                    token.cancel();
                    end_feed(ws_sender, account_id, cart_id, &event).await;
                    return Some(event);
                }
                Some(Err(e)) => {
                    error!(cart_id, "Ownership stream failed: {}", e);
                    token.cancel();
                    return None;
                }
                None => return None,
            }
        }
    }
}

async fn end_feed<S>(ws_sender: &Arc<Mutex<S>>, account_id: &str, cart_id: &str, event: &OwnershipEvent)
where
    S: Sink<Message> + Unpin,
{
    let cart_id = cart_id.to_string();
    let notice = match event {
        OwnershipEvent::Hijacked { owner } => {
            warn!(account_id, cart_id = %cart_id, new_owner = %owner, "Cart hijacked; terminating session.");
            ServerMessage::Hijacked { cart_id: cart_id.clone() }
        }
        OwnershipEvent::Removed => {
            warn!(account_id, cart_id = %cart_id, "Cart removed; terminating session.");
            ServerMessage::CartRemoved { cart_id: cart_id.clone() }
        }
        OwnershipEvent::Released | OwnershipEvent::Owned => {
            info!(account_id, cart_id = %cart_id, "Cart released; ending feed.");
            ServerMessage::Released { cart_id: cart_id.clone() }
        }
    };
    let forced = event_forces_empty_view(&notice);

    send_message(ws_sender, &notice).await;
    if forced {
        let empty = ServerMessage::CartView {
            view: CartViewDto::from(PricedCartView::empty(cart_id)),
        };
        send_message(ws_sender, &empty).await;
    }
}

fn event_forces_empty_view(notice: &ServerMessage) -> bool {
    matches!(
        notice,
        ServerMessage::Hijacked { .. } | ServerMessage::CartRemoved { .. }
    )
}

async fn send_message<S>(ws_sender: &Arc<Mutex<S>>, msg: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

async fn send_error(ws_sender: &WsSender, err: &ApiError) {
    let msg = ServerMessage::Error {
        error_kind: err.kind().to_string(),
        message: err.to_string(),
    };
    send_message(ws_sender, &msg).await;
}
