//! # Neutro Core
//!
//! Domain types, traits, and error definitions for the Neutro conversational
//! assistant. This crate has **no framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here (completion provider, session
//! store, ledger). Implementations live in their respective crates, so tests
//! run against scripted stand-ins and the backends are chosen by configuration.

pub mod error;
pub mod ledger;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, LedgerError, ProviderError, Result, StoreError};
pub use ledger::{CostType, LedgerSource, Saving, Transaction, TransactionKind};
pub use message::{Role, SessionId, Turn};
pub use provider::{CompletionRequest, CompletionResponse, Provider};
pub use store::{SessionStore, StoredKind, StoredMessage, StoredSession};
