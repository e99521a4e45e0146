pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use domain::{
    Account, AccountId, Barcode, Beacon, Binding, Cart, CartId, CartItem, CartLocation,
    LedgerReason, LocationEvent, Order, OrderItem, OrderStatus, PaymentReceipt, PointLedgerEntry,
    PointRules, Position, PricedCartView, PricedLine, Product,
};
pub use error::{CartError, CartResult};
pub use ports::{
    AccountStore, CancelReceipt, CartStore, CatalogGateway, GatewayFailure, GatewayOutcome,
    LedgerStore, LocationEventStore, OrderStore, PaymentGateway, PortError, PortResult, PortStream,
};
pub use services::{
    CartSessionManager, InventorySynchronizer, OrderReconciler, OwnershipEvent, PaymentConfirmation,
    PointsLedger, PrepareOrder,
};
