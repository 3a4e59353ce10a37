//! In-memory ledger, optionally loaded from a JSON export.
//!
//! The export layout mirrors the hosted tables the financial view reads:
//!
//! ```json
//! {
//!   "profiles": [{ "id": "u1", "username": "Ana" }],
//!   "transactions": [{ "user_id": "u1", "kind": "income", "amount": 2500.0,
//!                      "category": "Ventas", "date": "2026-10-02" }],
//!   "savings": [{ "user_id": "u1", "amount": 300.0, "date": "2026-09-30" }]
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;
use neutro_core::error::LedgerError;
use neutro_core::ledger::{LedgerSource, Saving, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub savings: Vec<Saving>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger export from disk.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Unavailable(format!("Failed to read {}: {e}", path.display()))
        })?;
        let ledger: Self = serde_json::from_str(&content)
            .map_err(|e| LedgerError::Parse(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            transactions = ledger.transactions.len(),
            "Ledger loaded"
        );
        Ok(ledger)
    }

    pub fn with_profile(mut self, id: impl Into<String>, username: impl Into<String>) -> Self {
        self.profiles.push(Profile {
            id: id.into(),
            username: username.into(),
        });
        self
    }

    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transactions.push(tx);
        self
    }

    pub fn with_saving(mut self, saving: Saving) -> Self {
        self.savings.push(saving);
        self
    }
}

#[async_trait]
impl LedgerSource for InMemoryLedger {
    async fn transactions(&self, user_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn savings(&self, user_id: &str) -> Result<Vec<Saving>, LedgerError> {
        Ok(self
            .savings
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, LedgerError> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.id == user_id)
            .map(|p| p.username.clone()))
    }
}
