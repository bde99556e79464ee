use crate::models::ProductKind;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Sale status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Paid,
    Cancelled,
}

impl SaleStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SaleStatus::Pending),
            "paid" => Ok(SaleStatus::Paid),
            "cancelled" => Ok(SaleStatus::Cancelled),
            _ => Err(format!("Invalid sale status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Paid => "paid",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl From<SaleStatus> for String {
    fn from(status: SaleStatus) -> Self {
        status.as_str().to_string()
    }
}

/// How the buyer settled the sale. Determines the gateway fee schedule;
/// wallet-settled sales incur no gateway fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Transfer,
    Cash,
    Wallet,
}

impl PaymentMethod {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "cash" => Ok(PaymentMethod::Cash),
            "wallet" => Ok(PaymentMethod::Wallet),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.as_str().to_string()
    }
}

/// One line of a sale. The unit price is already net of any discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: Uuid,
    pub product_kind: ProductKind,
    pub unit_price: Decimal,
    pub discount_code: Option<String>,
    /// Referral coupon attributed to the owning instructor, if any
    pub referral_code: Option<String>,
}

/// Sale model. Line items are stored as a JSONB array.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_method: String, // Stored as TEXT, use PaymentMethod enum for type safety
    pub status: String,         // Stored as TEXT, use SaleStatus enum for type safety
    pub items: Value,           // JSONB stored as serde_json::Value
    pub created_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
}

impl Sale {
    /// Create a new pending Sale
    pub fn new(user_id: Uuid, payment_method: PaymentMethod, items: Vec<SaleItem>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            payment_method: payment_method.as_str().to_string(),
            status: SaleStatus::Pending.as_str().to_string(),
            items: serde_json::to_value(items).unwrap_or(Value::Array(vec![])),
            created_at: chrono::Utc::now().naive_utc(),
            paid_at: None,
        }
    }

    /// Deserialize the JSONB line items
    pub fn items_vec(&self) -> Vec<SaleItem> {
        serde_json::from_value(self.items.clone()).unwrap_or_default()
    }

    pub fn status_enum(&self) -> Result<SaleStatus, String> {
        SaleStatus::from_str(&self.status)
    }

    pub fn payment_method_enum(&self) -> Result<PaymentMethod, String> {
        PaymentMethod::from_str(&self.payment_method)
    }

    pub fn is_paid(&self) -> bool {
        self.status == SaleStatus::Paid.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_conversion() {
        assert_eq!(PaymentMethod::Card.as_str(), "card");
        assert_eq!(PaymentMethod::from_str("WALLET"), Ok(PaymentMethod::Wallet));
        assert!(PaymentMethod::from_str("bitcoin").is_err());
    }

    #[test]
    fn test_sale_items_round_trip() {
        let item = SaleItem {
            product_id: Uuid::new_v4(),
            product_kind: ProductKind::Course,
            unit_price: Decimal::new(1500, 2),
            discount_code: None,
            referral_code: Some("REF-1".to_string()),
        };
        let sale = Sale::new(Uuid::new_v4(), PaymentMethod::Card, vec![item.clone()]);
        let items = sale.items_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, item.product_id);
        assert_eq!(items[0].unit_price, item.unit_price);
        assert!(!sale.is_paid());
    }
}
