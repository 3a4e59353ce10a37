//! Ledger source trait — read access to a user's transactions and savings.
//!
//! The hosted relational backend is an external collaborator; the financial
//! context builder only needs these three reads.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// Cost classification of an expense.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostType {
    Fixed,
    Variable,
    #[default]
    None,
}

/// A single ledger row.
///
/// `amount` is signed the way the ledger stores it: expenses are usually
/// negative, so the balance is the plain sum of every amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub kind: TransactionKind,
    #[serde(default)]
    pub cost_type: CostType,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub date: NaiveDate,
}

/// A savings deposit (or withdrawal, when negative).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saving {
    pub user_id: String,
    pub amount: f64,
    pub date: NaiveDate,
}

#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// All transactions of a user, any order.
    async fn transactions(&self, user_id: &str) -> std::result::Result<Vec<Transaction>, LedgerError>;

    /// All savings rows of a user.
    async fn savings(&self, user_id: &str) -> std::result::Result<Vec<Saving>, LedgerError>;

    /// The user's display name, if the profile exists.
    async fn display_name(&self, user_id: &str) -> std::result::Result<Option<String>, LedgerError>;
}
