//! Transaction models for the API service

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Direction of a transaction; the sign of `amount` carries no meaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// Exact, case-sensitive match on the wire name
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }

    /// Human readable label
    pub fn display_name(self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
        }
    }
}

/// Transaction entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub date: NaiveDate,
    pub description: String,
}

/// Validated payload for a new transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub date: NaiveDate,
    pub description: String,
}

/// Row filter resolved against the current time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    /// Inclusive lower bound on `date`
    pub since: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.transaction_type
            .is_none_or(|t| t == transaction.transaction_type)
            && self.since.is_none_or(|since| transaction.date >= since)
    }
}

/// Income and expense sums over a set of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub income: Decimal,
    pub expenses: Decimal,
}

/// Request body for transaction creation
///
/// Fields are kept as raw JSON so that validation can report which field is
/// wrong instead of rejecting the whole body.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub transaction_type: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
}

/// Query parameters for transaction listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionListQuery {
    pub transaction_type: Option<String>,
    pub period: Option<String>,
}

/// Response for a freshly created transaction
#[derive(Debug, Serialize)]
pub struct CreatedTransactionResponse {
    pub id: i64,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub message: String,
}

impl From<Transaction> for CreatedTransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            amount: t.amount,
            transaction_type: t.transaction_type,
            category: t.category,
            description: t.description,
            date: t.date,
            message: "Transaction created successfully".to_string(),
        }
    }
}

/// Transaction as it appears in a listing
#[derive(Debug, Serialize)]
pub struct TransactionItem {
    pub id: i64,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub type_display: &'static str,
}

impl From<Transaction> for TransactionItem {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            amount: t.amount,
            transaction_type: t.transaction_type,
            category: t.category,
            description: t.description,
            date: t.date,
            type_display: t.transaction_type.display_name(),
        }
    }
}

/// Response for transaction listing
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionItem>,
}

/// Response for category listing
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

/// Response for the month-to-date summary
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}
