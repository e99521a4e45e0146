//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of
//! every store port in the `smart_cart_core` crate. It handles all interactions
//! with the database using `sqlx`, and turns the `cart_changes` NOTIFY channel
//! into the change streams consumed by cart watchers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smart_cart_core::domain::{
    Account, Beacon, Cart, CartItem, CartLocation, LedgerReason, LocationEvent, Order, OrderItem,
    OrderStatus, PaymentReceipt, PointLedgerEntry, Position, Product,
};
use smart_cart_core::ports::{
    AccountStore, CartStore, CatalogGateway, LedgerStore, LocationEventStore, OrderStore,
    PortError, PortResult, PortStream,
};
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool};
use std::future::Future;
use uuid::Uuid;

/// Channel the cart triggers publish on. Payloads are `record:<id>` or `items:<id>`.
const CHANGE_CHANNEL: &str = "cart_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements all store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Re-runs `read` each time `key` is published on the change channel.
    fn watch<T, F, Fut>(&self, key: String, read: F) -> PortStream<T>
    where
        T: Send + 'static,
        F: Fn(PgPool) -> Fut + Send + 'static,
        Fut: Future<Output = PortResult<T>> + Send,
    {
        let pool = self.pool.clone();
        Box::pin(async_stream::stream! {
            let mut listener = match PgListener::connect_with(&pool).await {
                Ok(listener) => listener,
                Err(e) => {
                    yield Err::<T, PortError>(unexpected(e));
                    return;
                }
            };
            if let Err(e) = listener.listen(CHANGE_CHANNEL).await {
                yield Err::<T, PortError>(unexpected(e));
                return;
            }

            // LISTEN is active before the first read, so nothing falls in between.
            yield read(pool.clone()).await;
            loop {
                match listener.recv().await {
                    Ok(notification) if notification.payload() == key => {
                        yield read(pool.clone()).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err::<T, PortError>(unexpected(e));
                        break;
                    }
                }
            }
        })
    }
}

fn unexpected(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn to_i64(value: u64) -> PortResult<i64> {
    i64::try_from(value).map_err(|_| PortError::Unexpected(format!("{} overflows BIGINT", value)))
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |db| db.is_foreign_key_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    account_id: String,
    bound_cart_id: Option<String>,
    points: i64,
    total_distance: f64,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.account_id,
            bound_cart_id: self.bound_cart_id,
            points: to_u64(self.points),
            total_distance: self.total_distance,
        }
    }
}

#[derive(FromRow)]
struct CartRecord {
    cart_id: String,
    owner_account_id: Option<String>,
    location_x: Option<f64>,
    location_y: Option<f64>,
    location_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
}
impl CartRecord {
    fn to_domain(self) -> Cart {
        let last_location = match (self.location_x, self.location_y, self.location_at) {
            (Some(x), Some(y), Some(recorded_at)) => Some(CartLocation { x, y, recorded_at }),
            _ => None,
        };
        Cart {
            id: self.cart_id,
            owner_account_id: self.owner_account_id,
            last_location,
            released_at: self.released_at,
        }
    }
}

#[derive(FromRow)]
struct CartItemRecord {
    barcode: String,
    name: String,
    price: i64,
    quantity: i32,
    detected_at: DateTime<Utc>,
}
impl CartItemRecord {
    fn to_domain(self) -> CartItem {
        CartItem {
            barcode: self.barcode,
            name: self.name,
            price: to_u64(self.price),
            quantity: u32::try_from(self.quantity).unwrap_or(0),
            detected_at: self.detected_at,
        }
    }
}

#[derive(FromRow)]
struct ProductRecord {
    barcode: String,
    name: String,
    price: i64,
    stock: i64,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            barcode: self.barcode,
            name: self.name,
            price: to_u64(self.price),
            stock: to_u64(self.stock),
        }
    }
}

#[derive(FromRow)]
struct LedgerRecord {
    id: Uuid,
    account_id: String,
    amount: i64,
    reason: String,
    reference: Option<String>,
    created_at: DateTime<Utc>,
}
impl LedgerRecord {
    fn to_domain(self) -> PortResult<PointLedgerEntry> {
        Ok(PointLedgerEntry {
            id: self.id,
            account_id: self.account_id,
            amount: self.amount,
            reason: self.reason.parse::<LedgerReason>().map_err(PortError::Unexpected)?,
            reference: self.reference,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRecord {
    order_id: String,
    account_id: String,
    cart_id: Option<String>,
    total: i64,
    used_points: i64,
    discount: i64,
    final_amount: i64,
    status: String,
    payment_key: Option<String>,
    payment_status: Option<String>,
    payment_method: Option<String>,
    approved_at: Option<String>,
    paid_amount: Option<i64>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}
impl OrderRecord {
    fn to_domain(self, items: Vec<OrderItem>) -> PortResult<Order> {
        let order_id = self.order_id.clone();
        let payment = self.payment_key.map(|payment_key| PaymentReceipt {
            payment_key,
            order_id,
            status: self.payment_status.unwrap_or_default(),
            method: self.payment_method,
            approved_at: self.approved_at,
            total_amount: self.paid_amount.map_or(0, to_u64),
        });
        Ok(Order {
            id: self.order_id,
            account_id: self.account_id,
            cart_id: self.cart_id,
            items,
            total: to_u64(self.total),
            used_points: to_u64(self.used_points),
            discount: to_u64(self.discount),
            final_amount: to_u64(self.final_amount),
            status: self.status.parse::<OrderStatus>().map_err(PortError::Unexpected)?,
            payment,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRecord {
    barcode: String,
    name: String,
    price: i64,
    quantity: i32,
}
impl OrderItemRecord {
    fn to_domain(self) -> OrderItem {
        OrderItem {
            barcode: self.barcode,
            name: self.name,
            price: to_u64(self.price),
            quantity: u32::try_from(self.quantity).unwrap_or(0),
        }
    }
}

#[derive(FromRow)]
struct BeaconRecord {
    beacon_id: String,
    x: f64,
    y: f64,
}

#[derive(FromRow)]
struct LocationEventRecord {
    event_id: String,
    beacon_id: String,
    radius: f64,
    enabled: bool,
    points: i64,
    name: String,
}
impl LocationEventRecord {
    fn to_domain(self) -> LocationEvent {
        LocationEvent {
            id: self.event_id,
            beacon_id: self.beacon_id,
            radius: self.radius,
            enabled: self.enabled,
            points: to_u64(self.points),
            name: self.name,
        }
    }
}

//=========================================================================================
// Shared Reads
//=========================================================================================

const CART_COLUMNS: &str =
    "cart_id, owner_account_id, location_x, location_y, location_at, released_at";

async fn fetch_cart(pool: &PgPool, cart_id: &str) -> PortResult<Option<Cart>> {
    let record = sqlx::query_as::<_, CartRecord>(&format!(
        "SELECT {} FROM carts WHERE cart_id = $1",
        CART_COLUMNS
    ))
    .bind(cart_id)
    .fetch_optional(pool)
    .await
    .map_err(unexpected)?;
    Ok(record.map(CartRecord::to_domain))
}

async fn fetch_items(pool: &PgPool, cart_id: &str) -> PortResult<Vec<CartItem>> {
    let records = sqlx::query_as::<_, CartItemRecord>(
        "SELECT barcode, name, price, quantity, detected_at FROM cart_items \
         WHERE cart_id = $1 ORDER BY barcode",
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await
    .map_err(unexpected)?;
    Ok(records.into_iter().map(CartItemRecord::to_domain).collect())
}

async fn fetch_order_items(pool: &PgPool, order_id: &str) -> PortResult<Vec<OrderItem>> {
    let records = sqlx::query_as::<_, OrderItemRecord>(
        "SELECT barcode, name, price, quantity FROM order_items \
         WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .map_err(unexpected)?;
    Ok(records.into_iter().map(OrderItemRecord::to_domain).collect())
}

const ORDER_COLUMNS: &str = "order_id, account_id, cart_id, total, used_points, discount, \
     final_amount, status, payment_key, payment_status, payment_method, approved_at, \
     paid_amount, created_at, completed_at";

fn cart_not_found(cart_id: &str) -> PortError {
    PortError::NotFound(format!("Cart {} not found", cart_id))
}

fn account_not_found(account_id: &str) -> PortError {
    PortError::NotFound(format!("Account {} not found", account_id))
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn get_account(&self, account_id: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT account_id, bound_cart_id, points, total_distance FROM accounts \
             WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => account_not_found(account_id),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn ensure_account(&self, account_id: &str) -> PortResult<Account> {
        sqlx::query("INSERT INTO accounts (account_id) VALUES ($1) ON CONFLICT (account_id) DO NOTHING")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        self.get_account(account_id).await
    }

    async fn set_bound_cart(&self, account_id: &str, cart_id: Option<&str>) -> PortResult<()> {
        let result = sqlx::query("UPDATE accounts SET bound_cart_id = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(cart_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(account_not_found(account_id));
        }
        Ok(())
    }

    async fn add_points(&self, account_id: &str, amount: u64) -> PortResult<u64> {
        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET points = points + $2 WHERE account_id = $1 RETURNING points",
        )
        .bind(account_id)
        .bind(to_i64(amount)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        balance
            .map(to_u64)
            .ok_or_else(|| account_not_found(account_id))
    }

    async fn try_debit_points(&self, account_id: &str, amount: u64) -> PortResult<Option<u64>> {
        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET points = points - $2 \
             WHERE account_id = $1 AND points >= $2 RETURNING points",
        )
        .bind(account_id)
        .bind(to_i64(amount)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        match balance {
            Some(balance) => Ok(Some(to_u64(balance))),
            None => {
                // Distinguish "short balance" from "no such account".
                self.get_account(account_id).await?;
                Ok(None)
            }
        }
    }

    async fn add_distance(&self, account_id: &str, delta: f64) -> PortResult<f64> {
        let total: Option<f64> = sqlx::query_scalar(
            "UPDATE accounts SET total_distance = total_distance + $2 \
             WHERE account_id = $1 RETURNING total_distance",
        )
        .bind(account_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        total.ok_or_else(|| account_not_found(account_id))
    }
}

#[async_trait]
impl CartStore for DbAdapter {
    async fn get_cart(&self, cart_id: &str) -> PortResult<Cart> {
        fetch_cart(&self.pool, cart_id)
            .await?
            .ok_or_else(|| cart_not_found(cart_id))
    }

    async fn assign_owner(&self, cart_id: &str, account_id: &str) -> PortResult<Cart> {
        let record = sqlx::query_as::<_, CartRecord>(&format!(
            "UPDATE carts SET owner_account_id = $2 WHERE cart_id = $1 RETURNING {}",
            CART_COLUMNS
        ))
        .bind(cart_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(CartRecord::to_domain)
            .ok_or_else(|| cart_not_found(cart_id))
    }

    async fn release_owner(&self, cart_id: &str, released_at: DateTime<Utc>) -> PortResult<Cart> {
        let record = sqlx::query_as::<_, CartRecord>(&format!(
            "UPDATE carts SET owner_account_id = NULL, released_at = $2 \
             WHERE cart_id = $1 RETURNING {}",
            CART_COLUMNS
        ))
        .bind(cart_id)
        .bind(released_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(CartRecord::to_domain)
            .ok_or_else(|| cart_not_found(cart_id))
    }

    async fn set_location(&self, cart_id: &str, location: CartLocation) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE carts SET location_x = $2, location_y = $3, location_at = $4 \
             WHERE cart_id = $1",
        )
        .bind(cart_id)
        .bind(location.x)
        .bind(location.y)
        .bind(location.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(cart_not_found(cart_id));
        }
        Ok(())
    }

    async fn list_items(&self, cart_id: &str) -> PortResult<Vec<CartItem>> {
        fetch_items(&self.pool, cart_id).await
    }

    async fn put_item(&self, cart_id: &str, item: CartItem) -> PortResult<()> {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| PortError::Unexpected(format!("quantity {} overflows", item.quantity)))?;
        sqlx::query(
            "INSERT INTO cart_items (cart_id, barcode, name, price, quantity, detected_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (cart_id, barcode) DO UPDATE SET \
             name = EXCLUDED.name, price = EXCLUDED.price, \
             quantity = EXCLUDED.quantity, detected_at = EXCLUDED.detected_at",
        )
        .bind(cart_id)
        .bind(&item.barcode)
        .bind(&item.name)
        .bind(to_i64(item.price)?)
        .bind(quantity)
        .bind(item.detected_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                cart_not_found(cart_id)
            } else {
                unexpected(e)
            }
        })?;
        Ok(())
    }

    async fn set_item_quantity(&self, cart_id: &str, barcode: &str, quantity: u32) -> PortResult<bool> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| PortError::Unexpected(format!("quantity {} overflows", quantity)))?;
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND barcode = $2",
        )
        .bind(cart_id)
        .bind(barcode)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_item(&self, cart_id: &str, barcode: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND barcode = $2")
            .bind(cart_id)
            .bind(barcode)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn clear_items(&self, cart_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn watch_cart(&self, cart_id: &str) -> PortResult<PortStream<Option<Cart>>> {
        let id = cart_id.to_string();
        Ok(self.watch(format!("record:{}", cart_id), move |pool| {
            let id = id.clone();
            async move { fetch_cart(&pool, &id).await }
        }))
    }

    async fn watch_items(&self, cart_id: &str) -> PortResult<PortStream<Vec<CartItem>>> {
        let id = cart_id.to_string();
        Ok(self.watch(format!("items:{}", cart_id), move |pool| {
            let id = id.clone();
            async move { fetch_items(&pool, &id).await }
        }))
    }
}

#[async_trait]
impl CatalogGateway for DbAdapter {
    async fn get_product(&self, barcode: &str) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(
            "SELECT barcode, name, price, stock FROM products WHERE barcode = $1",
        )
        .bind(barcode)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Product {} not found", barcode)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn decrement_stock(&self, barcode: &str, quantity: u32) -> PortResult<Option<Product>> {
        let record = sqlx::query_as::<_, ProductRecord>(
            "UPDATE products SET stock = GREATEST(stock - $2, 0) WHERE barcode = $1 \
             RETURNING barcode, name, price, stock",
        )
        .bind(barcode)
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ProductRecord::to_domain))
    }

    async fn set_product(&self, product: Product) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO products (barcode, name, price, stock) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (barcode) DO UPDATE SET \
             name = EXCLUDED.name, price = EXCLUDED.price, stock = EXCLUDED.stock",
        )
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(to_i64(product.price)?)
        .bind(to_i64(product.stock)?)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for DbAdapter {
    async fn append(&self, entry: PointLedgerEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO point_ledger (id, account_id, amount, reason, reference, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(&entry.account_id)
        .bind(entry.amount)
        .bind(entry.reason.as_str())
        .bind(&entry.reference)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn entries_for(&self, account_id: &str) -> PortResult<Vec<PointLedgerEntry>> {
        sqlx::query_as::<_, LedgerRecord>(
            "SELECT id, account_id, amount, reason, reference, created_at FROM point_ledger \
             WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(LedgerRecord::to_domain)
        .collect()
    }
}

#[async_trait]
impl OrderStore for DbAdapter {
    async fn insert_order(&self, order: &Order) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO orders (order_id, account_id, cart_id, total, used_points, discount, \
             final_amount, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&order.id)
        .bind(&order.account_id)
        .bind(&order.cart_id)
        .bind(to_i64(order.total)?)
        .bind(to_i64(order.used_points)?)
        .bind(to_i64(order.discount)?)
        .bind(to_i64(order.final_amount)?)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .map_or(false, |db| db.is_unique_violation());
            if duplicate {
                PortError::Conflict(format!("Order {} already exists", order.id))
            } else {
                unexpected(e)
            }
        })?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, barcode, name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&order.id)
            .bind(position as i32)
            .bind(&item.barcode)
            .bind(&item.name)
            .bind(to_i64(item.price)?)
            .bind(i32::try_from(item.quantity).map_err(unexpected)?)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn get_order(&self, order_id: &str) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {} FROM orders WHERE order_id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Order {} not found", order_id)),
            _ => unexpected(e),
        })?;
        let items = fetch_order_items(&self.pool, order_id).await?;
        record.to_domain(items)
    }

    async fn orders_for(&self, account_id: &str) -> PortResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {} FROM orders WHERE account_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut orders = Vec::with_capacity(records.len());
        for record in records {
            let items = fetch_order_items(&self.pool, &record.order_id).await?;
            orders.push(record.to_domain(items)?);
        }
        Ok(orders)
    }

    async fn complete_order(
        &self,
        order_id: &str,
        receipt: PaymentReceipt,
        completed_at: DateTime<Utc>,
    ) -> PortResult<Option<Order>> {
        // The status predicate is the compare-and-set.
        let updated = sqlx::query(
            "UPDATE orders SET status = 'completed', payment_key = $2, payment_status = $3, \
             payment_method = $4, approved_at = $5, paid_amount = $6, completed_at = $7 \
             WHERE order_id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .bind(&receipt.payment_key)
        .bind(&receipt.status)
        .bind(&receipt.method)
        .bind(&receipt.approved_at)
        .bind(to_i64(receipt.total_amount)?)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?
        .rows_affected();

        let order = self.get_order(order_id).await?;
        Ok((updated > 0).then_some(order))
    }
}

#[async_trait]
impl LocationEventStore for DbAdapter {
    async fn list_events(&self) -> PortResult<Vec<LocationEvent>> {
        let records = sqlx::query_as::<_, LocationEventRecord>(
            "SELECT event_id, beacon_id, radius, enabled, points, name FROM location_events \
             ORDER BY event_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(LocationEventRecord::to_domain).collect())
    }

    async fn get_beacon(&self, beacon_id: &str) -> PortResult<Option<Beacon>> {
        let record = sqlx::query_as::<_, BeaconRecord>(
            "SELECT beacon_id, x, y FROM beacons WHERE beacon_id = $1",
        )
        .bind(beacon_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| Beacon {
            id: r.beacon_id,
            position: Position { x: r.x, y: r.y },
        }))
    }
}
