//! Error types for the Neutro domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Neutro operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Session store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Ledger errors ---
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of a completion call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The endpoint answered with a non-success status. The raw body is kept
    /// for diagnostics and never shown to the end user.
    #[error("Upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The body was not JSON, or none of the known envelope shapes matched.
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger data could not be parsed: {0}")]
    Parse(String),
}
