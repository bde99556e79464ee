use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Refund lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Completed,
    Failed,
}

impl RefundStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RefundStatus::Pending),
            "approved" => Ok(RefundStatus::Approved),
            "rejected" => Ok(RefundStatus::Rejected),
            "processing" => Ok(RefundStatus::Processing),
            "completed" => Ok(RefundStatus::Completed),
            "failed" => Ok(RefundStatus::Failed),
            _ => Err(format!("Invalid refund status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
        }
    }

    /// Only pending refunds accept a review decision.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, RefundStatus::Pending)
    }
}

impl From<RefundStatus> for String {
    fn from(status: RefundStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Reversal of one specific line item of a sale, not the whole sale.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Refund {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    /// Buyer whose wallet receives the credit
    pub user_id: Uuid,
    /// Paid line price being reversed
    pub line_price: Decimal,
    /// Gateway-fee claw-back withheld from the credit
    pub clawback_amount: Decimal,
    /// Amount credited to the buyer's wallet on approval
    pub refund_amount: Decimal,
    pub payment_method: String,
    pub status: String, // Stored as TEXT, use RefundStatus enum for type safety
    pub reason: Option<String>,
    pub admin_notes: Option<String>,
    pub requested_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    /// Earning this refund reversed, linked on approval
    pub earning_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
}

impl Refund {
    pub fn status_enum(&self) -> Result<RefundStatus, String> {
        RefundStatus::from_str(&self.status)
    }

    /// Validate that the credited amount reconciles with the claw-back.
    pub fn validate(&self) -> Result<(), String> {
        if self.refund_amount < Decimal::ZERO {
            return Err("refund amount must not be negative".to_string());
        }
        if self.refund_amount + self.clawback_amount != self.line_price {
            return Err(format!(
                "refund does not reconcile: {} + {} != {}",
                self.refund_amount, self.clawback_amount, self.line_price
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        assert_eq!(RefundStatus::Approved.as_str(), "approved");
        assert_eq!(RefundStatus::from_str("rejected"), Ok(RefundStatus::Rejected));
        assert!(RefundStatus::from_str("undone").is_err());
    }

    #[test]
    fn test_only_pending_is_reviewable() {
        assert!(RefundStatus::Pending.is_reviewable());
        assert!(!RefundStatus::Completed.is_reviewable());
        assert!(!RefundStatus::Rejected.is_reviewable());
    }
}
