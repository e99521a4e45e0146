//! services/api/src/adapters/memory.rs
//!
//! A process-local implementation of every store port. Change notifications
//! are fanned out over a `broadcast` channel so subscribers behave like the
//! PostgreSQL `LISTEN` adapter. Used by `STORE_BACKEND=memory` and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smart_cart_core::domain::{
    Account, Beacon, Cart, CartItem, CartLocation, LocationEvent, Order, OrderStatus,
    PaymentReceipt, PointLedgerEntry, Position, Product,
};
use smart_cart_core::ports::{
    AccountStore, CartStore, CatalogGateway, LedgerStore, LocationEventStore, OrderStore,
    PortError, PortResult, PortStream,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const CHANGE_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CartChange {
    Record(String),
    Items(String),
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    carts: HashMap<String, Cart>,
    items: HashMap<String, BTreeMap<String, CartItem>>,
    products: HashMap<String, Product>,
    ledger: Vec<PointLedgerEntry>,
    orders: HashMap<String, Order>,
    beacons: HashMap<String, Beacon>,
    events: BTreeMap<String, LocationEvent>,
}

struct Inner {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<CartChange>,
}

impl Inner {
    fn notify(&self, change: CartChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    async fn cart_snapshot(&self, cart_id: &str) -> Option<Cart> {
        self.tables.lock().await.carts.get(cart_id).cloned()
    }

    async fn items_snapshot(&self, cart_id: &str) -> Vec<CartItem> {
        self.tables
            .lock()
            .await
            .items
            .get(cart_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// An in-memory store implementing all cart core ports.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                changes,
            }),
        }
    }

    pub async fn insert_account(&self, account: Account) {
        let mut tables = self.inner.tables.lock().await;
        tables.accounts.insert(account.id.clone(), account);
    }

    pub async fn insert_cart(&self, cart: Cart) {
        let id = cart.id.clone();
        self.inner.tables.lock().await.carts.insert(id.clone(), cart);
        self.inner.notify(CartChange::Record(id));
    }

    /// Deletes a cart record and its items.
    pub async fn delete_cart(&self, cart_id: &str) {
        {
            let mut tables = self.inner.tables.lock().await;
            tables.carts.remove(cart_id);
            tables.items.remove(cart_id);
        }
        self.inner.notify(CartChange::Record(cart_id.to_string()));
        self.inner.notify(CartChange::Items(cart_id.to_string()));
    }

    pub async fn insert_beacon(&self, beacon: Beacon) {
        let mut tables = self.inner.tables.lock().await;
        tables.beacons.insert(beacon.id.clone(), beacon);
    }

    pub async fn insert_event(&self, event: LocationEvent) {
        let mut tables = self.inner.tables.lock().await;
        tables.events.insert(event.id.clone(), event);
    }

    /// Seeds carts 1-10, a sample grocery catalog, and one location event.
    pub async fn seed_demo(&self) {
        for n in 1..=10 {
            self.insert_cart(Cart::new(n.to_string())).await;
        }
        let catalog = [
            ("8801234567890", "Shin Ramyun", 3500, 50),
            ("8801234567891", "Samyang Ramyun", 3000, 30),
            ("8801234567892", "Coca-Cola", 1500, 100),
            ("8801234567893", "Cider", 1500, 80),
            ("8801234567894", "Milk", 2500, 20),
            ("8801234567895", "Yogurt", 3000, 40),
            ("8801234567896", "Bread", 2000, 15),
            ("8801234567897", "Snack", 1800, 60),
            ("8801234567898", "Chocolate", 2200, 45),
            ("8801234567899", "Apple", 5000, 25),
        ];
        let mut tables = self.inner.tables.lock().await;
        for (barcode, name, price, stock) in catalog {
            tables.products.insert(
                barcode.to_string(),
                Product {
                    barcode: barcode.to_string(),
                    name: name.to_string(),
                    price,
                    stock,
                },
            );
        }
        tables.beacons.insert(
            "entrance".to_string(),
            Beacon {
                id: "entrance".to_string(),
                position: Position { x: 0.0, y: 0.0 },
            },
        );
        tables.events.insert(
            "welcome".to_string(),
            LocationEvent {
                id: "welcome".to_string(),
                beacon_id: "entrance".to_string(),
                radius: 5.0,
                enabled: true,
                points: 50,
                name: "Welcome bonus".to_string(),
            },
        );
    }

    /// A stream that re-reads a snapshot whenever `key` changes.
    fn watch<T, F, Fut>(&self, key: CartChange, read: F) -> PortStream<T>
    where
        T: Send + 'static,
        F: Fn(Arc<Inner>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = T> + Send,
    {
        let inner = self.inner.clone();
        // Subscribe before the first read so no change is missed in between.
        let mut rx = inner.changes.subscribe();
        Box::pin(async_stream::stream! {
            yield Ok::<T, PortError>(read(inner.clone()).await);
            loop {
                match rx.recv().await {
                    Ok(change) if change == key => yield Ok::<T, PortError>(read(inner.clone()).await),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => yield Ok::<T, PortError>(read(inner.clone()).await),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

fn account_not_found(account_id: &str) -> PortError {
    PortError::NotFound(format!("Account {} not found", account_id))
}

fn cart_not_found(cart_id: &str) -> PortError {
    PortError::NotFound(format!("Cart {} not found", cart_id))
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, account_id: &str) -> PortResult<Account> {
        let tables = self.inner.tables.lock().await;
        tables
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| account_not_found(account_id))
    }

    async fn ensure_account(&self, account_id: &str) -> PortResult<Account> {
        let mut tables = self.inner.tables.lock().await;
        Ok(tables
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id))
            .clone())
    }

    async fn set_bound_cart(&self, account_id: &str, cart_id: Option<&str>) -> PortResult<()> {
        let mut tables = self.inner.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| account_not_found(account_id))?;
        account.bound_cart_id = cart_id.map(str::to_string);
        Ok(())
    }

    async fn add_points(&self, account_id: &str, amount: u64) -> PortResult<u64> {
        let mut tables = self.inner.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| account_not_found(account_id))?;
        account.points += amount;
        Ok(account.points)
    }

    async fn try_debit_points(&self, account_id: &str, amount: u64) -> PortResult<Option<u64>> {
        let mut tables = self.inner.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| account_not_found(account_id))?;
        if account.points < amount {
            return Ok(None);
        }
        account.points -= amount;
        Ok(Some(account.points))
    }

    async fn add_distance(&self, account_id: &str, delta: f64) -> PortResult<f64> {
        let mut tables = self.inner.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| account_not_found(account_id))?;
        account.total_distance += delta;
        Ok(account.total_distance)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_cart(&self, cart_id: &str) -> PortResult<Cart> {
        self.inner
            .cart_snapshot(cart_id)
            .await
            .ok_or_else(|| cart_not_found(cart_id))
    }

    async fn assign_owner(&self, cart_id: &str, account_id: &str) -> PortResult<Cart> {
        let cart = {
            let mut tables = self.inner.tables.lock().await;
            let cart = tables
                .carts
                .get_mut(cart_id)
                .ok_or_else(|| cart_not_found(cart_id))?;
            cart.owner_account_id = Some(account_id.to_string());
            cart.clone()
        };
        self.inner.notify(CartChange::Record(cart_id.to_string()));
        Ok(cart)
    }

    async fn release_owner(&self, cart_id: &str, released_at: DateTime<Utc>) -> PortResult<Cart> {
        let cart = {
            let mut tables = self.inner.tables.lock().await;
            let cart = tables
                .carts
                .get_mut(cart_id)
                .ok_or_else(|| cart_not_found(cart_id))?;
            cart.owner_account_id = None;
            cart.released_at = Some(released_at);
            cart.clone()
        };
        self.inner.notify(CartChange::Record(cart_id.to_string()));
        Ok(cart)
    }

    async fn set_location(&self, cart_id: &str, location: CartLocation) -> PortResult<()> {
        {
            let mut tables = self.inner.tables.lock().await;
            let cart = tables
                .carts
                .get_mut(cart_id)
                .ok_or_else(|| cart_not_found(cart_id))?;
            cart.last_location = Some(location);
        }
        self.inner.notify(CartChange::Record(cart_id.to_string()));
        Ok(())
    }

    async fn list_items(&self, cart_id: &str) -> PortResult<Vec<CartItem>> {
        Ok(self.inner.items_snapshot(cart_id).await)
    }

    async fn put_item(&self, cart_id: &str, item: CartItem) -> PortResult<()> {
        {
            let mut tables = self.inner.tables.lock().await;
            if !tables.carts.contains_key(cart_id) {
                return Err(cart_not_found(cart_id));
            }
            tables
                .items
                .entry(cart_id.to_string())
                .or_default()
                .insert(item.barcode.clone(), item);
        }
        self.inner.notify(CartChange::Items(cart_id.to_string()));
        Ok(())
    }

    async fn set_item_quantity(&self, cart_id: &str, barcode: &str, quantity: u32) -> PortResult<bool> {
        let updated = {
            let mut tables = self.inner.tables.lock().await;
            match tables.items.get_mut(cart_id).and_then(|items| items.get_mut(barcode)) {
                Some(item) => {
                    item.quantity = quantity;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.inner.notify(CartChange::Items(cart_id.to_string()));
        }
        Ok(updated)
    }

    async fn remove_item(&self, cart_id: &str, barcode: &str) -> PortResult<()> {
        let removed = {
            let mut tables = self.inner.tables.lock().await;
            tables
                .items
                .get_mut(cart_id)
                .and_then(|items| items.remove(barcode))
                .is_some()
        };
        if removed {
            self.inner.notify(CartChange::Items(cart_id.to_string()));
        }
        Ok(())
    }

    async fn clear_items(&self, cart_id: &str) -> PortResult<()> {
        self.inner.tables.lock().await.items.remove(cart_id);
        self.inner.notify(CartChange::Items(cart_id.to_string()));
        Ok(())
    }

    async fn watch_cart(&self, cart_id: &str) -> PortResult<PortStream<Option<Cart>>> {
        let id = cart_id.to_string();
        Ok(self.watch(CartChange::Record(id.clone()), move |inner| {
            let id = id.clone();
            async move { inner.cart_snapshot(&id).await }
        }))
    }

    async fn watch_items(&self, cart_id: &str) -> PortResult<PortStream<Vec<CartItem>>> {
        let id = cart_id.to_string();
        Ok(self.watch(CartChange::Items(id.clone()), move |inner| {
            let id = id.clone();
            async move { inner.items_snapshot(&id).await }
        }))
    }
}

#[async_trait]
impl CatalogGateway for MemoryStore {
    async fn get_product(&self, barcode: &str) -> PortResult<Product> {
        let tables = self.inner.tables.lock().await;
        tables
            .products
            .get(barcode)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", barcode)))
    }

    async fn decrement_stock(&self, barcode: &str, quantity: u32) -> PortResult<Option<Product>> {
        let mut tables = self.inner.tables.lock().await;
        Ok(tables.products.get_mut(barcode).map(|product| {
            product.stock = product.stock.saturating_sub(u64::from(quantity));
            product.clone()
        }))
    }

    async fn set_product(&self, product: Product) -> PortResult<()> {
        let mut tables = self.inner.tables.lock().await;
        tables.products.insert(product.barcode.clone(), product);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append(&self, entry: PointLedgerEntry) -> PortResult<()> {
        self.inner.tables.lock().await.ledger.push(entry);
        Ok(())
    }

    async fn entries_for(&self, account_id: &str) -> PortResult<Vec<PointLedgerEntry>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .ledger
            .iter()
            .rev()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> PortResult<()> {
        let mut tables = self.inner.tables.lock().await;
        if tables.orders.contains_key(&order.id) {
            return Err(PortError::Conflict(format!("Order {} already exists", order.id)));
        }
        tables.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> PortResult<Order> {
        let tables = self.inner.tables.lock().await;
        tables
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn orders_for(&self, account_id: &str) -> PortResult<Vec<Order>> {
        let tables = self.inner.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.account_id == account_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn complete_order(
        &self,
        order_id: &str,
        receipt: PaymentReceipt,
        completed_at: DateTime<Utc>,
    ) -> PortResult<Option<Order>> {
        let mut tables = self.inner.tables.lock().await;
        let order = tables
            .orders
            .get_mut(order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        if !order.status.can_transition_to(OrderStatus::Completed) {
            return Ok(None);
        }
        order.status = OrderStatus::Completed;
        order.payment = Some(receipt);
        order.completed_at = Some(completed_at);
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl LocationEventStore for MemoryStore {
    async fn list_events(&self) -> PortResult<Vec<LocationEvent>> {
        // BTreeMap iteration is already in key order.
        Ok(self.inner.tables.lock().await.events.values().cloned().collect())
    }

    async fn get_beacon(&self, beacon_id: &str) -> PortResult<Option<Beacon>> {
        Ok(self.inner.tables.lock().await.beacons.get(beacon_id).cloned())
    }
}
