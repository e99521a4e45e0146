//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how it is wired from a store.

use crate::config::Config;
use smart_cart_core::ports::{
    AccountStore, CartStore, CatalogGateway, LedgerStore, LocationEventStore, OrderStore,
    PaymentGateway,
};
use smart_cart_core::services::{
    CartSessionManager, InventorySynchronizer, OrderReconciler, PointsLedger,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<CartSessionManager>,
    pub inventory: Arc<InventorySynchronizer>,
    pub points: Arc<PointsLedger>,
    pub orders: Arc<OrderReconciler>,
}

impl AppState {
    /// Wires the four core services onto one store that implements every port.
    pub fn build<S>(config: Arc<Config>, store: Arc<S>, payments: Arc<dyn PaymentGateway>) -> Self
    where
        S: AccountStore
            + CartStore
            + CatalogGateway
            + LedgerStore
            + OrderStore
            + LocationEventStore
            + 'static,
    {
        let accounts: Arc<dyn AccountStore> = store.clone();
        let carts: Arc<dyn CartStore> = store.clone();
        let catalog: Arc<dyn CatalogGateway> = store.clone();
        let ledger: Arc<dyn LedgerStore> = store.clone();
        let order_store: Arc<dyn OrderStore> = store.clone();
        let events: Arc<dyn LocationEventStore> = store;

        let sessions = Arc::new(CartSessionManager::new(accounts.clone(), carts.clone()));
        let inventory = Arc::new(InventorySynchronizer::new(carts.clone(), catalog.clone()));
        let points = Arc::new(PointsLedger::new(
            accounts.clone(),
            ledger,
            events,
            config.point_rules,
        ));
        let orders = Arc::new(OrderReconciler::new(
            accounts.clone(),
            carts,
            catalog,
            order_store,
            payments,
            points.clone(),
            sessions.clone(),
        ));

        Self {
            config,
            accounts,
            sessions,
            inventory,
            points,
            orders,
        }
    }
}
