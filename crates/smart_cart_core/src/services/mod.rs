pub mod inventory;
pub mod points;
pub mod reconciler;
pub mod session;

pub use inventory::{InventorySynchronizer, MAX_QUANTITY};
pub use points::{DistanceAccrual, LedgerAudit, PointsLedger, TriggeredEvent};
pub use reconciler::{OrderReconciler, PaymentConfirmation, PrepareOrder};
pub use session::{CartSessionManager, OwnershipEvent};
