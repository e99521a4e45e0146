//! services/api/src/web/dto.rs
//!
//! Request and response payloads of the REST API. The core domain types carry
//! no serialization concerns, so every wire shape lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smart_cart_core::domain::{
    Binding, CartItem, CartLocation, Order, OrderItem, PaymentReceipt, PointLedgerEntry,
    PricedCartView, PricedLine, Product,
};
use smart_cart_core::ports::CancelReceipt;
use smart_cart_core::services::{DistanceAccrual, LedgerAudit, TriggeredEvent};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationRequest {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetQuantityRequest {
    /// Values below 1 are clamped to 1.
    pub quantity: i64,
}

/// A product reading reported by a cart's sensor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DetectionRequest {
    pub barcode: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DistanceRequest {
    /// Distance walked since the last report.
    pub distance: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PrepareOrderRequest {
    pub items: Vec<OrderItemDto>,
    pub total: u64,
    #[serde(default)]
    pub used_points: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub payment_key: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelPaymentRequest {
    pub payment_key: String,
    pub cancel_reason: String,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BindingDto {
    pub cart_id: String,
    pub owner_account_id: Option<String>,
    pub in_use: bool,
}

impl From<Binding> for BindingDto {
    fn from(binding: Binding) -> Self {
        Self {
            cart_id: binding.cart_id,
            owner_account_id: binding.owner_account_id,
            in_use: binding.in_use,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLocationDto {
    pub x: f64,
    pub y: f64,
    pub recorded_at: DateTime<Utc>,
}

impl From<CartLocation> for CartLocationDto {
    fn from(location: CartLocation) -> Self {
        Self {
            x: location.x,
            y: location.y,
            recorded_at: location.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLineDto {
    pub barcode: String,
    pub name: String,
    pub unit_price: u64,
    pub quantity: u32,
    pub in_stock: bool,
    pub line_total: u64,
}

impl From<PricedLine> for CartLineDto {
    fn from(line: PricedLine) -> Self {
        Self {
            barcode: line.barcode,
            name: line.name,
            unit_price: line.unit_price,
            quantity: line.quantity,
            in_stock: line.in_stock,
            line_total: line.line_total,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartViewDto {
    pub cart_id: String,
    pub lines: Vec<CartLineDto>,
    pub total: u64,
}

impl From<PricedCartView> for CartViewDto {
    fn from(view: PricedCartView) -> Self {
        Self {
            cart_id: view.cart_id,
            lines: view.lines.into_iter().map(CartLineDto::from).collect(),
            total: view.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemDto {
    pub barcode: String,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
    pub detected_at: DateTime<Utc>,
}

impl From<CartItem> for CartItemDto {
    fn from(item: CartItem) -> Self {
        Self {
            barcode: item.barcode,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
            detected_at: item.detected_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuantityDto {
    pub cart_id: String,
    pub barcode: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDto {
    pub barcode: String,
    pub name: String,
    pub price: u64,
    pub stock: u64,
    pub in_stock: bool,
}

impl From<Product> for ProductDto {
    fn from(product: Product) -> Self {
        let in_stock = product.in_stock();
        Self {
            barcode: product.barcode,
            name: product.name,
            price: product.price,
            stock: product.stock,
            in_stock,
        }
    }
}

/// Current balance together with the ledger reconciliation check.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PointsDto {
    pub balance: u64,
    pub ledger_sum: i64,
    pub consistent: bool,
}

impl From<LedgerAudit> for PointsDto {
    fn from(audit: LedgerAudit) -> Self {
        Self {
            balance: audit.balance,
            ledger_sum: audit.ledger_sum,
            consistent: audit.consistent,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerEntryDto {
    pub id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PointLedgerEntry> for LedgerEntryDto {
    fn from(entry: PointLedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            reason: entry.reason.to_string(),
            reference: entry.reference,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DistanceAccrualDto {
    pub earned_points: u64,
    pub balance: u64,
    pub total_distance: f64,
}

impl From<DistanceAccrual> for DistanceAccrualDto {
    fn from(accrual: DistanceAccrual) -> Self {
        Self {
            earned_points: accrual.earned_points,
            balance: accrual.balance,
            total_distance: accrual.total_distance,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TriggeredEventDto {
    pub event_id: String,
    pub name: String,
    pub points: u64,
    pub balance: u64,
}

/// `triggered` is null when no event fired.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LocationCheckDto {
    pub triggered: Option<TriggeredEventDto>,
}

impl From<Option<TriggeredEvent>> for LocationCheckDto {
    fn from(event: Option<TriggeredEvent>) -> Self {
        Self {
            triggered: event.map(|event| TriggeredEventDto {
                event_id: event.event_id,
                name: event.name,
                points: event.points,
                balance: event.balance,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemDto {
    pub barcode: String,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
}

impl From<OrderItem> for OrderItemDto {
    fn from(item: OrderItem) -> Self {
        Self {
            barcode: item.barcode,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
        }
    }
}

impl From<OrderItemDto> for OrderItem {
    fn from(item: OrderItemDto) -> Self {
        Self {
            barcode: item.barcode,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentDto {
    pub payment_key: String,
    pub status: String,
    pub method: Option<String>,
    pub approved_at: Option<String>,
    pub total_amount: u64,
}

impl From<PaymentReceipt> for PaymentDto {
    fn from(receipt: PaymentReceipt) -> Self {
        Self {
            payment_key: receipt.payment_key,
            status: receipt.status,
            method: receipt.method,
            approved_at: receipt.approved_at,
            total_amount: receipt.total_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDto {
    pub order_id: String,
    pub cart_id: Option<String>,
    pub items: Vec<OrderItemDto>,
    pub total: u64,
    pub used_points: u64,
    pub discount: u64,
    pub final_amount: u64,
    /// `pending` or `completed`.
    pub status: String,
    pub payment: Option<PaymentDto>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderDto {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            cart_id: order.cart_id,
            items: order.items.into_iter().map(OrderItemDto::from).collect(),
            total: order.total,
            used_points: order.used_points,
            discount: order.discount,
            final_amount: order.final_amount,
            status: order.status.as_str().to_string(),
            payment: order.payment.map(PaymentDto::from),
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancelReceiptDto {
    pub payment_key: String,
    pub status: String,
}

impl From<CancelReceipt> for CancelReceiptDto {
    fn from(receipt: CancelReceipt) -> Self {
        Self {
            payment_key: receipt.payment_key,
            status: receipt.status,
        }
    }
}
