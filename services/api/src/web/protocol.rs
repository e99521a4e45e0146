//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between a shopper's client and the
//! API server for the live cart feed.

use serde::{Deserialize, Serialize};

use crate::web::dto::CartViewDto;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts the feed for a cart the caller owns. This must be the first message.
    Watch { cart_id: String },

    SetQuantity { barcode: String, quantity: i64 },

    RemoveItem { barcode: String },

    /// Ends the shopping session and releases the cart.
    Logout,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the feed is running.
    Watching { cart_id: String },

    /// The full priced cart, sent on every change.
    CartView { view: CartViewDto },

    /// Another account now owns the cart. The server closes the socket next.
    Hijacked { cart_id: String },

    /// The cart record no longer exists. The server closes the socket next.
    CartRemoved { cart_id: String },

    /// The cart was released (checkout, logout, or release request).
    Released { cart_id: String },

    Error { error_kind: String, message: String },
}
