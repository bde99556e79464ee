use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Earning lifecycle status.
///
/// `pending → available → paid` is the settlement path; `refunded` diverts
/// an unsettled earning; `disputed`/`blocked` are administrative holds.
/// No transition ever moves an earning backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarningStatus {
    Pending,
    Available,
    Paid,
    Disputed,
    Blocked,
    Refunded,
}

impl EarningStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(EarningStatus::Pending),
            "available" => Ok(EarningStatus::Available),
            "paid" => Ok(EarningStatus::Paid),
            "disputed" => Ok(EarningStatus::Disputed),
            "blocked" => Ok(EarningStatus::Blocked),
            "refunded" => Ok(EarningStatus::Refunded),
            _ => Err(format!("Invalid earning status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningStatus::Pending => "pending",
            EarningStatus::Available => "available",
            EarningStatus::Paid => "paid",
            EarningStatus::Disputed => "disputed",
            EarningStatus::Blocked => "blocked",
            EarningStatus::Refunded => "refunded",
        }
    }

    /// The earning has been settled to the instructor; nothing may touch it.
    pub fn is_settled(&self) -> bool {
        matches!(self, EarningStatus::Paid)
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EarningStatus::Paid | EarningStatus::Refunded)
    }

    /// Whether a transition to `next` is permitted. The table is the single
    /// source of truth; repositories enforce it with conditional updates.
    pub fn can_transition_to(&self, next: EarningStatus) -> bool {
        use EarningStatus::*;
        match (*self, next) {
            (Pending, Available) => true,
            (Available, Paid) => true,
            // refund may intercept before settlement
            (Pending, Refunded) | (Available, Refunded) => true,
            // administrative holds, and their release back into the flow
            (Pending, Disputed) | (Available, Disputed) => true,
            (Pending, Blocked) | (Available, Blocked) => true,
            (Disputed, Available) | (Blocked, Available) => true,
            (Disputed, Refunded) | (Blocked, Refunded) => true,
            _ => false,
        }
    }
}

impl From<EarningStatus> for String {
    fn from(status: EarningStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Withholding estimate captured at earning creation. An internal audit
/// approximation, not a filing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalBreakdown {
    pub gross: Decimal,
    pub income_tax_withheld: Decimal,
    pub vat_withheld: Decimal,
    pub net_after_withholding: Decimal,
}

/// One instructor's share of one sold line item.
///
/// The financial snapshot fields are immutable after creation; only the
/// lifecycle fields advance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Earning {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_kind: String,
    // Financial snapshot at creation time
    pub sale_price: Decimal,
    pub gateway_fee_amount: Decimal,
    pub platform_commission_rate: Decimal,
    pub platform_commission_amount: Decimal,
    pub instructor_earning: Decimal,
    // Lifecycle
    pub status: String, // Stored as TEXT, use EarningStatus enum for type safety
    pub earned_at: NaiveDateTime,
    pub available_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
    pub refunded_at: Option<NaiveDateTime>,
    pub payment_id: Option<Uuid>,
    pub refund_id: Option<Uuid>,
    pub fiscal: Option<Value>, // JSONB withholding snapshot
    pub created_at: NaiveDateTime,
}

impl Earning {
    pub fn status_enum(&self) -> Result<EarningStatus, String> {
        EarningStatus::from_str(&self.status)
    }

    pub fn fiscal_breakdown(&self) -> Option<FiscalBreakdown> {
        self.fiscal
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Validate that the snapshot amounts reconcile exactly. A failure here
    /// indicates a defect upstream, never a runtime condition to recover from.
    pub fn validate(&self) -> Result<(), String> {
        if self.gateway_fee_amount < rust_decimal::Decimal::ZERO
            || self.gateway_fee_amount > self.sale_price
        {
            return Err("gateway fee outside [0, sale_price]".to_string());
        }
        let net = self.sale_price - self.gateway_fee_amount;
        if self.instructor_earning + self.platform_commission_amount != net {
            return Err(format!(
                "shares do not reconcile: {} + {} != {}",
                self.instructor_earning, self.platform_commission_amount, net
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
        assert_eq!(EarningStatus::Available.as_str(), "available");
        assert_eq!(
            EarningStatus::from_str("Refunded"),
            Ok(EarningStatus::Refunded)
        );
        assert!(EarningStatus::from_str("settled").is_err());
    }

    #[test]
    fn test_settlement_path() {
        assert!(EarningStatus::Pending.can_transition_to(EarningStatus::Available));
        assert!(EarningStatus::Available.can_transition_to(EarningStatus::Paid));
        assert!(!EarningStatus::Pending.can_transition_to(EarningStatus::Paid));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!EarningStatus::Paid.can_transition_to(EarningStatus::Available));
        assert!(!EarningStatus::Paid.can_transition_to(EarningStatus::Pending));
        assert!(!EarningStatus::Available.can_transition_to(EarningStatus::Pending));
        assert!(!EarningStatus::Refunded.can_transition_to(EarningStatus::Available));
    }

    #[test]
    fn test_paid_is_untouchable() {
        for next in [
            EarningStatus::Pending,
            EarningStatus::Available,
            EarningStatus::Disputed,
            EarningStatus::Blocked,
            EarningStatus::Refunded,
        ] {
            assert!(!EarningStatus::Paid.can_transition_to(next));
        }
        assert!(EarningStatus::Paid.is_settled());
        assert!(EarningStatus::Paid.is_terminal());
    }

    #[test]
    fn test_refund_interception() {
        assert!(EarningStatus::Pending.can_transition_to(EarningStatus::Refunded));
        assert!(EarningStatus::Available.can_transition_to(EarningStatus::Refunded));
        assert!(!EarningStatus::Paid.can_transition_to(EarningStatus::Refunded));
    }

    #[test]
    fn test_administrative_holds() {
        assert!(EarningStatus::Available.can_transition_to(EarningStatus::Disputed));
        assert!(EarningStatus::Disputed.can_transition_to(EarningStatus::Available));
        assert!(EarningStatus::Blocked.can_transition_to(EarningStatus::Refunded));
        // a hold is not reachable from a settled earning
        assert!(!EarningStatus::Paid.can_transition_to(EarningStatus::Blocked));
    }
}
