use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Payout batch lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Whether a transition to `next` is permitted.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (*self, next) {
            (Pending, Processing) => true,
            (Pending, Cancelled) => true,
            (Processing, Completed) => true,
            (Processing, Failed) => true,
            (Processing, Cancelled) => true,
            // a failed batch may be retried by moving it back through processing
            (Failed, Processing) => true,
            _ => false,
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// One append-only entry of a payout batch's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: PaymentStatus,
    pub actor: Uuid,
    pub notes: Option<String>,
    pub at: NaiveDateTime,
}

/// Administrator-created aggregation of available earnings settled in one
/// payment to an instructor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub earning_ids: Value, // JSONB array of earning UUIDs
    pub total_earnings: Decimal,
    pub platform_deductions: Decimal,
    pub final_amount: Decimal,
    pub payment_method: String,
    pub currency: String,
    pub status: String,         // Stored as TEXT, use PaymentStatus enum for type safety
    pub status_history: Value,  // JSONB array of StatusHistoryEntry, append-only
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub processed_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Payment {
    pub fn status_enum(&self) -> Result<PaymentStatus, String> {
        PaymentStatus::from_str(&self.status)
    }

    pub fn earning_ids_vec(&self) -> Vec<Uuid> {
        serde_json::from_value(self.earning_ids.clone()).unwrap_or_default()
    }

    pub fn status_history_vec(&self) -> Vec<StatusHistoryEntry> {
        serde_json::from_value(self.status_history.clone()).unwrap_or_default()
    }
}

/// Deterministic transition projection: given the current status and a
/// requested transition, yield the history entry to append, or the pair of
/// statuses that make the request invalid. The audit trail is a pure
/// function of the accepted events, not a side effect of saves.
pub fn apply_transition(
    current: PaymentStatus,
    next: PaymentStatus,
    actor: Uuid,
    notes: Option<String>,
    at: NaiveDateTime,
) -> Result<StatusHistoryEntry, (PaymentStatus, PaymentStatus)> {
    if !current.can_transition_to(next) {
        return Err((current, next));
    }
    Ok(StatusHistoryEntry {
        status: next,
        actor,
        notes,
        at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        assert_eq!(PaymentStatus::Processing.as_str(), "processing");
        assert_eq!(
            PaymentStatus::from_str("COMPLETED"),
            Ok(PaymentStatus::Completed)
        );
        assert!(PaymentStatus::from_str("done").is_err());
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Processing));
        assert!(PaymentStatus::Processing.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Processing.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Processing));

        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Processing));
        assert!(!PaymentStatus::Cancelled.can_transition_to(PaymentStatus::Processing));
    }

    #[test]
    fn test_apply_transition_projection() {
        let admin = Uuid::new_v4();
        let at = chrono::Utc::now().naive_utc();

        let entry = apply_transition(
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            admin,
            Some("wire initiated".to_string()),
            at,
        )
        .unwrap();
        assert_eq!(entry.status, PaymentStatus::Processing);
        assert_eq!(entry.actor, admin);
        assert_eq!(entry.at, at);

        let err = apply_transition(PaymentStatus::Completed, PaymentStatus::Pending, admin, None, at);
        assert_eq!(err.unwrap_err(), (PaymentStatus::Completed, PaymentStatus::Pending));
    }
}
