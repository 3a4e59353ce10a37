//! Conversation memory and persistence for Neutro.
//!
//! - [`MessageStore`]: the bounded rolling window of turns a session sends
//! - session stores: in-memory, JSONL file, SQLite
//! - [`InMemoryLedger`]: a ledger source backed by a JSON export

pub mod file_backend;
pub mod in_memory;
pub mod ledger;
pub mod window;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;
pub use ledger::{InMemoryLedger, Profile};
pub use window::{DEFAULT_CAPACITY, MessageStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
