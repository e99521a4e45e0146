//! crates/smart_cart_core/src/domain.rs
//!
//! Defines the pure, core data structures for the smart cart backend.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque account identity issued by the external authentication provider.
pub type AccountId = String;
/// Short code printed on a physical cart.
pub type CartId = String;
pub type Barcode = String;

//=========================================================================================
// Accounts and Carts
//=========================================================================================

/// A shopper account as seen by the cart core.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub bound_cart_id: Option<CartId>,
    pub points: u64,
    pub total_distance: f64,
}

impl Account {
    /// A freshly registered account with no cart, no points, and no distance.
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            bound_cart_id: None,
            points: 0,
            total_distance: 0.0,
        }
    }
}

/// The last reported position of a cart on the store floor.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLocation {
    pub x: f64,
    pub y: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A physical cart record.
///
/// There is no stored `in_use` flag: it is derived from the owner so that
/// `in_use == true` iff `owner_account_id.is_some()` cannot be violated.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    pub id: CartId,
    pub owner_account_id: Option<AccountId>,
    pub last_location: Option<CartLocation>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn new(id: impl Into<CartId>) -> Self {
        Self {
            id: id.into(),
            owner_account_id: None,
            last_location: None,
            released_at: None,
        }
    }

    pub fn in_use(&self) -> bool {
        self.owner_account_id.is_some()
    }

    pub fn is_owned_by(&self, account_id: &str) -> bool {
        self.owner_account_id.as_deref() == Some(account_id)
    }

    pub fn binding(&self) -> Binding {
        Binding {
            cart_id: self.id.clone(),
            owner_account_id: self.owner_account_id.clone(),
            in_use: self.in_use(),
        }
    }
}

/// The (account, cart) ownership relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub cart_id: CartId,
    pub owner_account_id: Option<AccountId>,
    pub in_use: bool,
}

/// A sensor-detected product sitting in a cart.
///
/// `name` and `price` are the values known when the item was detected; they
/// are only shown when the catalog no longer has the product.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub barcode: Barcode,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
    pub detected_at: DateTime<Utc>,
}

//=========================================================================================
// Catalog
//=========================================================================================

/// A catalog product. Prices are integers in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub barcode: Barcode,
    pub name: String,
    pub price: u64,
    pub stock: u64,
}

impl Product {
    /// Availability is always derived from stock; there is no manual override.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// One priced row of the live cart view.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub barcode: Barcode,
    pub name: String,
    pub unit_price: u64,
    pub quantity: u32,
    pub in_stock: bool,
    pub line_total: u64,
}

impl PricedLine {
    /// Joins a cart item with its catalog record. A missing product is shown
    /// as out of stock at the item's last-known name and price.
    pub fn price(item: &CartItem, product: Option<&Product>) -> Self {
        let (name, unit_price, in_stock) = match product {
            Some(product) => (product.name.clone(), product.price, product.in_stock()),
            None => (item.name.clone(), item.price, false),
        };
        Self {
            barcode: item.barcode.clone(),
            name,
            unit_price,
            quantity: item.quantity,
            in_stock,
            line_total: unit_price.saturating_mul(u64::from(item.quantity)),
        }
    }
}

/// The priced, live view of a cart's contents.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedCartView {
    pub cart_id: CartId,
    pub lines: Vec<PricedLine>,
    pub total: u64,
}

impl PricedCartView {
    pub fn new(cart_id: impl Into<CartId>, mut lines: Vec<PricedLine>) -> Self {
        lines.sort_by(|a, b| a.barcode.cmp(&b.barcode));
        let total = lines
            .iter()
            .fold(0u64, |total, line| total.saturating_add(line.line_total));
        Self {
            cart_id: cart_id.into(),
            lines,
            total,
        }
    }

    pub fn empty(cart_id: impl Into<CartId>) -> Self {
        Self::new(cart_id, Vec::new())
    }
}

//=========================================================================================
// Loyalty Points
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerReason {
    Distance,
    LocationEvent,
    Purchase,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Distance => "distance",
            LedgerReason::LocationEvent => "location_event",
            LedgerReason::Purchase => "purchase",
        }
    }
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distance" => Ok(LedgerReason::Distance),
            "location_event" => Ok(LedgerReason::LocationEvent),
            "purchase" => Ok(LedgerReason::Purchase),
            other => Err(format!("unknown ledger reason '{}'", other)),
        }
    }
}

/// An immutable record of a point balance change.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLedgerEntry {
    pub id: Uuid,
    pub account_id: AccountId,
    /// Positive for earn, negative for spend.
    pub amount: i64,
    pub reason: LedgerReason,
    /// Order id for purchases, event display name for location events.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PointLedgerEntry {
    pub fn new(
        account_id: impl Into<AccountId>,
        amount: i64,
        reason: LedgerReason,
        reference: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            amount,
            reason,
            reference,
            created_at: Utc::now(),
        }
    }
}

/// Conversion constants for the loyalty program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRules {
    /// Distance units walked per point earned.
    pub distance_per_point: f64,
    /// Currency units one point is worth at checkout.
    pub point_to_won: u64,
}

impl Default for PointRules {
    fn default() -> Self {
        Self {
            distance_per_point: 10.0,
            point_to_won: 10,
        }
    }
}

/// A point on the store floor plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Beacon {
    pub id: String,
    pub position: Position,
}

/// A geofenced reward placed around a beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationEvent {
    pub id: String,
    pub beacon_id: String,
    pub radius: f64,
    pub enabled: bool,
    pub points: u64,
    pub name: String,
}

//=========================================================================================
// Orders
//=========================================================================================

/// The order lifecycle. `Pending -> Completed` is the only legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!((self, next), (OrderStatus::Pending, OrderStatus::Completed))
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// A line of an order, frozen at the time the order was prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub barcode: Barcode,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
}

/// Payment metadata attached to an order by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_key: String,
    /// The order the gateway captured this payment for.
    pub order_id: String,
    /// Gateway payment status, e.g. `DONE` or `IN_PROGRESS`.
    pub status: String,
    pub method: Option<String>,
    pub approved_at: Option<String>,
    pub total_amount: u64,
}

impl PaymentReceipt {
    pub const DONE: &'static str = "DONE";

    /// True when this is a settled payment of exactly `order`'s final amount.
    pub fn settles(&self, order: &Order) -> bool {
        self.status == Self::DONE
            && self.order_id == order.id
            && self.total_amount == order.final_amount
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub account_id: AccountId,
    /// The cart bound to the account when the order was prepared.
    pub cart_id: Option<CartId>,
    pub items: Vec<OrderItem>,
    pub total: u64,
    pub used_points: u64,
    pub discount: u64,
    pub final_amount: u64,
    pub status: OrderStatus,
    pub payment: Option<PaymentReceipt>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(barcode: &str, price: u64, quantity: u32) -> CartItem {
        CartItem {
            barcode: barcode.to_string(),
            name: format!("sensor {}", barcode),
            price,
            quantity,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn cart_in_use_follows_owner() {
        let mut cart = Cart::new("7");
        assert!(!cart.in_use());
        cart.owner_account_id = Some("alice".to_string());
        assert!(cart.in_use());
        assert!(cart.binding().in_use);
        assert!(cart.is_owned_by("alice"));
        assert!(!cart.is_owned_by("bob"));
    }

    #[test]
    fn missing_product_is_priced_from_item_and_out_of_stock() {
        let line = PricedLine::price(&item("880", 1500, 2), None);
        assert_eq!(line.unit_price, 1500);
        assert_eq!(line.line_total, 3000);
        assert!(!line.in_stock);
        assert_eq!(line.name, "sensor 880");
    }

    #[test]
    fn huge_prices_saturate_instead_of_overflowing() {
        let line = PricedLine::price(&item("880", 100_000_000_000, 1_000_000_000), None);
        assert_eq!(line.line_total, u64::MAX);

        let view = PricedCartView::new(
            "7",
            vec![line, PricedLine::price(&item("881", 1500, 1), None)],
        );
        assert_eq!(view.total, u64::MAX);
    }

    fn order(id: &str, final_amount: u64) -> Order {
        Order {
            id: id.to_string(),
            account_id: "alice".to_string(),
            cart_id: None,
            items: Vec::new(),
            total: final_amount,
            used_points: 0,
            discount: 0,
            final_amount,
            status: OrderStatus::Pending,
            payment: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn receipt(order_id: &str, status: &str, total_amount: u64) -> PaymentReceipt {
        PaymentReceipt {
            payment_key: "pk".to_string(),
            order_id: order_id.to_string(),
            status: status.to_string(),
            method: None,
            approved_at: None,
            total_amount,
        }
    }

    #[test]
    fn only_a_settled_payment_of_the_same_order_and_amount_settles_it() {
        let pending = order("ORDER_2_alice", 8500);
        assert!(receipt("ORDER_2_alice", "DONE", 8500).settles(&pending));
        assert!(!receipt("ORDER_1_alice", "DONE", 8500).settles(&pending));
        assert!(!receipt("ORDER_2_alice", "DONE", 8400).settles(&pending));
        assert!(!receipt("ORDER_2_alice", "IN_PROGRESS", 8500).settles(&pending));
    }

    #[test]
    fn catalog_price_overrides_detected_price() {
        let product = Product {
            barcode: "880".to_string(),
            name: "Cola".to_string(),
            price: 1800,
            stock: 0,
        };
        let line = PricedLine::price(&item("880", 1500, 3), Some(&product));
        assert_eq!(line.name, "Cola");
        assert_eq!(line.line_total, 5400);
        assert!(!line.in_stock);
    }

    #[test]
    fn view_total_sums_lines_in_barcode_order() {
        let lines = vec![
            PricedLine::price(&item("b", 2500, 1), None),
            PricedLine::price(&item("a", 3500, 2), None),
        ];
        let view = PricedCartView::new("1", lines);
        assert_eq!(view.total, 9500);
        assert_eq!(view.lines[0].barcode, "a");
        assert_eq!(PricedCartView::empty("1").total, 0);
    }

    #[test]
    fn only_pending_orders_complete() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Pending));
        assert_eq!("completed".parse::<OrderStatus>(), Ok(OrderStatus::Completed));
    }

    #[test]
    fn euclidean_distance() {
        let a = Position { x: 0.0, y: 0.0 };
        let b = Position { x: 3.0, y: 4.0 };
        assert_eq!(a.distance_to(&b), 5.0);
    }
}
