//! crates/smart_cart_core/src/services/inventory.rs
//!
//! Inventory Synchronizer: joins a cart's sensor-reported item list with the
//! catalog to produce the live, priced cart view.

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{CartItem, PricedCartView, PricedLine, Product};
use crate::error::{CartError, CartResult};
use crate::ports::{CartStore, CatalogGateway, PortError, PortResult, PortStream};

pub struct InventorySynchronizer {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogGateway>,
}

impl InventorySynchronizer {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn CatalogGateway>) -> Self {
        Self { carts, catalog }
    }

    /// Live priced view of a cart. Re-derived from the catalog on every change
    /// to the item list; resubscribe to restart.
    pub async fn watch_cart(&self, cart_id: &str) -> CartResult<PortStream<PricedCartView>> {
        let items = self.carts.watch_items(cart_id).await?;
        let catalog = self.catalog.clone();
        let cart_id = cart_id.to_string();

        let views = items.then(move |snapshot| {
            let catalog = catalog.clone();
            let cart_id = cart_id.clone();
            async move {
                let items = snapshot?;
                price_items(catalog.as_ref(), &cart_id, items).await
            }
        });
        Ok(Box::pin(views))
    }

    /// One-off priced view of a cart.
    pub async fn view(&self, cart_id: &str) -> CartResult<PricedCartView> {
        let items = self.carts.list_items(cart_id).await?;
        Ok(price_items(self.catalog.as_ref(), cart_id, items).await?)
    }

    /// Sets an item's quantity, clamped to `1..=MAX_QUANTITY`. Stock is not checked.
    pub async fn set_quantity(&self, cart_id: &str, barcode: &str, quantity: i64) -> CartResult<u32> {
        let quantity = clamp_quantity(quantity);
        if !self.carts.set_item_quantity(cart_id, barcode, quantity).await? {
            return Err(CartError::NotFound(format!(
                "item {} is not in cart {}",
                barcode, cart_id
            )));
        }
        debug!(cart_id, barcode, quantity, "Item quantity updated.");
        Ok(quantity)
    }

    /// Removes an item. Removing an absent item is a no-op.
    pub async fn remove_item(&self, cart_id: &str, barcode: &str) -> CartResult<()> {
        self.carts.remove_item(cart_id, barcode).await?;
        debug!(cart_id, barcode, "Item removed.");
        Ok(())
    }

    /// Ingests a sensor detection. The item is keyed by barcode, so a repeated
    /// detection overwrites the previous one.
    pub async fn record_detection(
        &self,
        cart_id: &str,
        barcode: &str,
        quantity: u32,
    ) -> CartResult<CartItem> {
        if barcode.trim().is_empty() {
            return Err(CartError::validation("barcode is required"));
        }
        // The cart must exist before items can land in it.
        self.carts.get_cart(cart_id).await?;

        let product = self.catalog.get_product(barcode).await?;
        if !product.in_stock() {
            return Err(CartError::validation(format!(
                "product {} is out of stock",
                barcode
            )));
        }

        let item = CartItem {
            barcode: product.barcode,
            name: product.name,
            price: product.price,
            quantity: quantity.clamp(1, MAX_QUANTITY),
            detected_at: Utc::now(),
        };
        self.carts.put_item(cart_id, item.clone()).await?;
        info!(cart_id, barcode, quantity = item.quantity, "Sensor detection recorded.");
        Ok(item)
    }

    pub async fn product(&self, barcode: &str) -> CartResult<Product> {
        Ok(self.catalog.get_product(barcode).await?)
    }
}

/// Largest quantity a cart line may hold; the SQL column is a 32-bit integer.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

fn clamp_quantity(quantity: i64) -> u32 {
    quantity.clamp(1, i64::from(MAX_QUANTITY)) as u32
}

async fn price_items(
    catalog: &dyn CatalogGateway,
    cart_id: &str,
    items: Vec<CartItem>,
) -> PortResult<PricedCartView> {
    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let product = match catalog.get_product(&item.barcode).await {
            Ok(product) => Some(product),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        lines.push(PricedLine::price(item, product.as_ref()));
    }
    Ok(PricedCartView::new(cart_id, lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_is_clamped_to_at_least_one() {
        assert_eq!(clamp_quantity(0), 1);
        assert_eq!(clamp_quantity(-4), 1);
        assert_eq!(clamp_quantity(5), 5);
        assert_eq!(clamp_quantity(i64::MAX), MAX_QUANTITY);
        assert_eq!(clamp_quantity(i64::from(u32::MAX)), 2_147_483_647);
    }
}
