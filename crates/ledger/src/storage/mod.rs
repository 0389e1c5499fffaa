//! Storage backends for accounts, transactions, and sync status

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;
pub use traits::LedgerStore;
