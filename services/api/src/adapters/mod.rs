pub mod db;
pub mod memory;
pub mod toss;

pub use db::DbAdapter;
pub use memory::MemoryStore;
pub use toss::TossPaymentsAdapter;
