use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User account. Instructors and students share the same table; an
/// instructor is any user that owns products.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Configured payout destination label (e.g. "bank_transfer", "paypal").
    /// An instructor without one cannot receive a payout batch.
    pub payout_method: Option<String>,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Create a new User (typically used for creating from API input)
    pub fn new(email: String, display_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            payout_method: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn has_payout_method(&self) -> bool {
        self.payout_method
            .as_deref()
            .map(|m| !m.trim().is_empty())
            .unwrap_or(false)
    }
}
