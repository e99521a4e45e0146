//! crates/smart_cart_core/src/services/reconciler.rs
//!
//! Order & Payment Reconciler: turns a priced cart into a pending order,
//! confirms it with the payment gateway, and applies the post-payment side
//! effects exactly once.
//!
//! Side effects after a successful confirmation run in a fixed order:
//!   1. mark the order completed (compare-and-set, the only gate)
//!   2. decrement product stock
//!   3. debit used points
//!   4. clear the cart's items
//!   5. release the cart
//! They are not atomic. A failure after step 1 leaves a completed order with
//! the remaining effects undone; it is logged and reported, never compensated.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{LedgerReason, Order, OrderItem, OrderStatus, PaymentReceipt};
use crate::error::{CartError, CartResult};
use crate::ports::{
    AccountStore, CancelReceipt, CartStore, CatalogGateway, GatewayOutcome, OrderStore,
    PaymentGateway,
};
use crate::services::{CartSessionManager, PointsLedger};

/// Input to `prepare`.
#[derive(Debug, Clone)]
pub struct PrepareOrder {
    pub items: Vec<OrderItem>,
    pub total: u64,
    pub used_points: u64,
}

/// What the client received from the payment widget after checkout.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub payment_key: String,
    pub amount: u64,
}

/// Discount and final amount for an order.
pub fn price_order(total: u64, used_points: u64, point_to_won: u64) -> CartResult<(u64, u64)> {
    let discount = used_points
        .checked_mul(point_to_won)
        .ok_or_else(|| CartError::validation("used points are out of range"))?;
    let final_amount = total.checked_sub(discount).ok_or_else(|| {
        CartError::validation(format!(
            "discount {} exceeds order total {}",
            discount, total
        ))
    })?;
    Ok((discount, final_amount))
}

/// `ORDER_<unix millis>_<first 8 chars of the account id>`.
pub fn order_id_for(account_id: &str, at: DateTime<Utc>) -> String {
    let prefix: String = account_id.chars().take(8).collect();
    format!("ORDER_{}_{}", at.timestamp_millis(), prefix)
}

pub struct OrderReconciler {
    accounts: Arc<dyn AccountStore>,
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogGateway>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentGateway>,
    points: Arc<PointsLedger>,
    sessions: Arc<CartSessionManager>,
}

impl OrderReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogGateway>,
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentGateway>,
        points: Arc<PointsLedger>,
        sessions: Arc<CartSessionManager>,
    ) -> Self {
        Self {
            accounts,
            carts,
            catalog,
            orders,
            payments,
            points,
            sessions,
        }
    }

    /// Creates a pending order. Points, stock, and cart are left untouched.
    pub async fn prepare(&self, account_id: &str, request: PrepareOrder) -> CartResult<Order> {
        if request.items.is_empty() {
            return Err(CartError::validation("an order needs at least one item"));
        }
        if let Some(item) = request.items.iter().find(|item| item.quantity == 0) {
            return Err(CartError::validation(format!(
                "item {} has a zero quantity",
                item.barcode
            )));
        }

        let account = self.accounts.get_account(account_id).await?;
        if request.used_points > account.points {
            return Err(CartError::InsufficientPoints {
                requested: request.used_points,
                available: account.points,
            });
        }

        let (discount, final_amount) = price_order(
            request.total,
            request.used_points,
            self.points.rules().point_to_won,
        )?;

        let now = Utc::now();
        let order = Order {
            id: order_id_for(account_id, now),
            account_id: account_id.to_string(),
            cart_id: account.bound_cart_id,
            items: request.items,
            total: request.total,
            used_points: request.used_points,
            discount,
            final_amount,
            status: OrderStatus::Pending,
            payment: None,
            created_at: now,
            completed_at: None,
        };
        self.orders.insert_order(&order).await?;

        info!(order_id = %order.id, account_id, final_amount, "Order prepared.");
        Ok(order)
    }

    pub async fn order(&self, account_id: &str, order_id: &str) -> CartResult<Order> {
        let order = self.orders.get_order(order_id).await?;
        if order.account_id != account_id {
            return Err(CartError::NotFound(format!("order {}", order_id)));
        }
        Ok(order)
    }

    pub async fn orders(&self, account_id: &str) -> CartResult<Vec<Order>> {
        Ok(self.orders.orders_for(account_id).await?)
    }

    /// Confirms payment for a pending order.
    ///
    /// Safe to retry: a completed order is returned as-is, and a gateway
    /// "duplicate request" rejection is resolved to the stored completed order.
    pub async fn confirm(
        &self,
        account_id: &str,
        order_id: &str,
        confirmation: PaymentConfirmation,
    ) -> CartResult<Order> {
        if confirmation.payment_key.trim().is_empty() {
            return Err(CartError::validation("payment key is required"));
        }

        let order = self.order(account_id, order_id).await?;
        if order.is_completed() {
            info!(order_id, "Order already completed; returning stored result.");
            return Ok(order);
        }
        if confirmation.amount != order.final_amount {
            return Err(CartError::validation(format!(
                "amount {} does not match order amount {}",
                confirmation.amount, order.final_amount
            )));
        }

        let outcome = self
            .payments
            .confirm(&order.id, &confirmation.payment_key, confirmation.amount)
            .await
            .map_err(CartError::gateway_unreachable)?;

        match outcome {
            GatewayOutcome::Approved(receipt) => self.complete(order, receipt).await,
            GatewayOutcome::Rejected(failure) if failure.is_duplicate_request() => {
                info!(order_id, code = %failure.code, "Duplicate confirmation; re-reading order.");
                self.recover_duplicate(order, &confirmation.payment_key).await
            }
            GatewayOutcome::Rejected(failure) => {
                warn!(order_id, code = %failure.code, message = %failure.message, "Payment rejected; cart preserved.");
                Err(failure.into())
            }
        }
    }

    /// Forwards a cancellation to the gateway. Local stock and points are not
    /// reversed.
    pub async fn cancel(&self, payment_key: &str, reason: &str) -> CartResult<CancelReceipt> {
        if payment_key.trim().is_empty() || reason.trim().is_empty() {
            return Err(CartError::validation(
                "payment key and cancel reason are required",
            ));
        }

        match self
            .payments
            .cancel(payment_key, reason)
            .await
            .map_err(CartError::gateway_unreachable)?
        {
            GatewayOutcome::Approved(receipt) => {
                info!(payment_key, status = %receipt.status, "Payment cancelled at gateway.");
                Ok(receipt)
            }
            GatewayOutcome::Rejected(failure) => {
                warn!(payment_key, code = %failure.code, "Cancellation rejected.");
                Err(failure.into())
            }
        }
    }

    async fn recover_duplicate(&self, order: Order, payment_key: &str) -> CartResult<Order> {
        let current = self.orders.get_order(&order.id).await?;
        if current.is_completed() {
            return Ok(current);
        }

        // The gateway captured the money but we never recorded it. Pull the
        // payment and finish through the normal completion gate.
        warn!(order_id = %order.id, "Gateway reports a duplicate for a pending order; fetching payment.");
        match self
            .payments
            .fetch(payment_key)
            .await
            .map_err(CartError::gateway_unreachable)?
        {
            GatewayOutcome::Approved(receipt) if receipt.settles(&current) => {
                self.complete(current, receipt).await
            }
            GatewayOutcome::Approved(receipt) => {
                warn!(
                    order_id = %current.id,
                    paid_order_id = %receipt.order_id,
                    status = %receipt.status,
                    paid_amount = receipt.total_amount,
                    "Fetched payment does not settle this order; leaving it pending."
                );
                Err(CartError::Gateway {
                    code: "PAYMENT_MISMATCH".to_string(),
                    message: format!(
                        "payment {} is {} for order {} ({}), expected DONE for order {} ({})",
                        receipt.payment_key,
                        receipt.status,
                        receipt.order_id,
                        receipt.total_amount,
                        current.id,
                        current.final_amount
                    ),
                })
            }
            GatewayOutcome::Rejected(failure) => Err(failure.into()),
        }
    }

    async fn complete(&self, order: Order, receipt: PaymentReceipt) -> CartResult<Order> {
        let Some(completed) = self
            .orders
            .complete_order(&order.id, receipt, Utc::now())
            .await?
        else {
            info!(order_id = %order.id, "Order completed by a concurrent confirmation.");
            return Ok(self.orders.get_order(&order.id).await?);
        };

        info!(order_id = %completed.id, "Order completed; applying side effects.");
        self.apply_side_effects(&completed).await?;
        Ok(completed)
    }

    async fn apply_side_effects(&self, order: &Order) -> CartResult<()> {
        self.decrement_stock(order)
            .await
            .map_err(|e| side_effect_failed(order, "decrement_stock", e))?;

        if order.used_points > 0 {
            self.points
                .debit(
                    &order.account_id,
                    order.used_points,
                    LedgerReason::Purchase,
                    Some(order.id.clone()),
                )
                .await
                .map_err(|e| side_effect_failed(order, "debit_points", e))?;
        }

        let Some(cart_id) = order.cart_id.as_deref() else {
            return Ok(());
        };
        let cart = self
            .carts
            .get_cart(cart_id)
            .await
            .map_err(|e| side_effect_failed(order, "clear_cart", e.into()))?;
        if !cart.is_owned_by(&order.account_id) {
            warn!(order_id = %order.id, cart_id, "Cart changed hands before completion; leaving it alone.");
            return Ok(());
        }

        self.carts
            .clear_items(cart_id)
            .await
            .map_err(|e| side_effect_failed(order, "clear_cart", e.into()))?;
        self.sessions
            .release_cart(cart_id)
            .await
            .map_err(|e| side_effect_failed(order, "release_cart", e))?;
        Ok(())
    }

    async fn decrement_stock(&self, order: &Order) -> CartResult<()> {
        for item in &order.items {
            match self.catalog.decrement_stock(&item.barcode, item.quantity).await? {
                Some(product) => {
                    info!(barcode = %product.barcode, stock = product.stock, "Stock decremented.");
                }
                None => {
                    warn!(order_id = %order.id, barcode = %item.barcode, "Ordered product no longer in catalog.");
                }
            }
        }
        Ok(())
    }
}

fn side_effect_failed(order: &Order, step: &'static str, err: CartError) -> CartError {
    error!(
        order_id = %order.id,
        account_id = %order.account_id,
        step,
        error = %err,
        "Order completed but a side effect failed; manual reconciliation required."
    );
    CartError::SideEffect {
        order_id: order.id.clone(),
        step,
        message: err.to_string(),
    }
}
