//! crates/smart_cart_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the cart core.
//! These traits form the boundary of the hexagonal architecture: the services
//! depend on typed repositories and gateways, never on a concrete store handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    Account, Beacon, Cart, CartItem, CartLocation, LocationEvent, Order, PaymentReceipt,
    PointLedgerEntry, Product,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// An infinite stream of change snapshots. The current value is emitted first.
pub type PortStream<T> = Pin<Box<dyn Stream<Item = PortResult<T>> + Send>>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, account_id: &str) -> PortResult<Account>;

    /// Returns the account, registering it with an empty balance on first sight.
    async fn ensure_account(&self, account_id: &str) -> PortResult<Account>;

    async fn set_bound_cart(&self, account_id: &str, cart_id: Option<&str>) -> PortResult<()>;

    /// Atomically increments the balance and returns the new value.
    async fn add_points(&self, account_id: &str, amount: u64) -> PortResult<u64>;

    /// Atomically decrements the balance if it covers `amount`.
    /// Returns `None` when the balance is insufficient.
    async fn try_debit_points(&self, account_id: &str, amount: u64) -> PortResult<Option<u64>>;

    /// Atomically adds to the cumulative distance and returns the new total.
    async fn add_distance(&self, account_id: &str, delta: f64) -> PortResult<f64>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    // --- Cart Records ---
    async fn get_cart(&self, cart_id: &str) -> PortResult<Cart>;

    /// Overwrites the owner. The store applies last-writer-wins.
    async fn assign_owner(&self, cart_id: &str, account_id: &str) -> PortResult<Cart>;

    /// Clears the owner and stamps `released_at`.
    async fn release_owner(&self, cart_id: &str, released_at: DateTime<Utc>) -> PortResult<Cart>;

    async fn set_location(&self, cart_id: &str, location: CartLocation) -> PortResult<()>;

    // --- Live Item List ---
    async fn list_items(&self, cart_id: &str) -> PortResult<Vec<CartItem>>;

    async fn put_item(&self, cart_id: &str, item: CartItem) -> PortResult<()>;

    /// Returns `false` if the item is not in the cart.
    async fn set_item_quantity(&self, cart_id: &str, barcode: &str, quantity: u32)
        -> PortResult<bool>;

    async fn remove_item(&self, cart_id: &str, barcode: &str) -> PortResult<()>;

    async fn clear_items(&self, cart_id: &str) -> PortResult<()>;

    // --- Subscriptions ---
    /// Emits the cart record on every change; `None` once the cart is deleted.
    async fn watch_cart(&self, cart_id: &str) -> PortResult<PortStream<Option<Cart>>>;

    /// Emits the full item list on every change to it.
    async fn watch_items(&self, cart_id: &str) -> PortResult<PortStream<Vec<CartItem>>>;
}

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn get_product(&self, barcode: &str) -> PortResult<Product>;

    /// Decrements stock by `quantity`, flooring at zero.
    /// Returns `None` if the product no longer exists.
    async fn decrement_stock(&self, barcode: &str, quantity: u32) -> PortResult<Option<Product>>;

    /// Used by catalog administration only.
    async fn set_product(&self, product: Product) -> PortResult<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, entry: PointLedgerEntry) -> PortResult<()>;

    /// All entries for an account, newest first.
    async fn entries_for(&self, account_id: &str) -> PortResult<Vec<PointLedgerEntry>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> PortResult<()>;

    async fn get_order(&self, order_id: &str) -> PortResult<Order>;

    /// Orders placed by an account, newest first.
    async fn orders_for(&self, account_id: &str) -> PortResult<Vec<Order>>;

    /// Compare-and-set `pending -> completed`.
    /// Returns `None` when the order was already completed by someone else.
    async fn complete_order(
        &self,
        order_id: &str,
        receipt: PaymentReceipt,
        completed_at: DateTime<Utc>,
    ) -> PortResult<Option<Order>>;
}

#[async_trait]
pub trait LocationEventStore: Send + Sync {
    /// All configured events ordered by their key.
    async fn list_events(&self) -> PortResult<Vec<LocationEvent>>;

    async fn get_beacon(&self, beacon_id: &str) -> PortResult<Option<Beacon>>;
}

//=========================================================================================
// Payment Gateway Port
//=========================================================================================

/// A business-level rejection returned by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    pub code: String,
    pub message: String,
}

impl GatewayFailure {
    pub const DUPLICATE_CODE: &'static str = "ALREADY_PROCESSED_PAYMENT";
    const DUPLICATE_MARKER: &'static str = "[S008]";

    /// The gateway reports that this confirmation was already processed.
    pub fn is_duplicate_request(&self) -> bool {
        self.code == Self::DUPLICATE_CODE || self.message.contains(Self::DUPLICATE_MARKER)
    }
}

/// The tagged result of a gateway call that reached the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome<T> {
    Approved(T),
    Rejected(GatewayFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReceipt {
    pub payment_key: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(
        &self,
        order_id: &str,
        payment_key: &str,
        amount: u64,
    ) -> PortResult<GatewayOutcome<PaymentReceipt>>;

    async fn cancel(&self, payment_key: &str, reason: &str)
        -> PortResult<GatewayOutcome<CancelReceipt>>;

    /// Looks up an already-approved payment.
    async fn fetch(&self, payment_key: &str) -> PortResult<GatewayOutcome<PaymentReceipt>>;
}
