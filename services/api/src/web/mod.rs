pub mod dto;
pub mod middleware;
pub mod orders;
pub mod points;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the entry points used by the binaries and the integration tests.
pub use middleware::{require_account, Caller, ACCOUNT_HEADER};
pub use rest::{router, ApiDoc};
pub use state::AppState;
pub use ws_handler::{follow_ownership, release_on_disconnect, ws_handler};
