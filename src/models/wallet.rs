use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user wallet holding the running balance. Lazily provisioned with a
/// zero balance on first access.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Direction of a wallet movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletTransactionType {
    Credit,
    Debit,
}

impl WalletTransactionType {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "credit" => Ok(WalletTransactionType::Credit),
            "debit" => Ok(WalletTransactionType::Debit),
            _ => Err(format!("Invalid wallet transaction type: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionType::Credit => "credit",
            WalletTransactionType::Debit => "debit",
        }
    }
}

impl From<WalletTransactionType> for String {
    fn from(t: WalletTransactionType) -> Self {
        t.as_str().to_string()
    }
}

/// Append-only wallet movement. `balance_after` is captured at write time
/// and never recomputed later.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: String, // Stored as TEXT, use WalletTransactionType for type safety
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: NaiveDateTime,
}

impl WalletTransaction {
    pub fn tx_type(&self) -> Option<WalletTransactionType> {
        WalletTransactionType::from_str(&self.transaction_type).ok()
    }
}
