use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Per-instructor commission rate override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRate {
    pub instructor_id: Uuid,
    pub rate: Decimal,
    pub reason: String,
    pub effective_from: NaiveDate,
    pub set_by: Uuid,
}

/// Singleton platform commission policy. Lazily created with defaults on
/// first access; every mutation records the acting administrator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommissionSettings {
    pub id: i32, // always 1; the table enforces a single row
    pub default_commission_rate: Decimal,
    pub referral_commission_rate: Decimal,
    pub days_until_available: i32,
    pub minimum_payment_threshold: Decimal,
    pub custom_rates: Value, // JSONB array of CustomRate
    pub updated_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CommissionSettings {
    /// Platform defaults used when the singleton row is first provisioned.
    pub fn defaults() -> (Decimal, Decimal, i32, Decimal) {
        (
            Decimal::new(30, 2), // 30% platform commission
            Decimal::new(20, 2), // 20% on referral sales
            7,                   // one-week availability window
            Decimal::new(5000, 2), // 50.00 minimum payout
        )
    }

    pub fn custom_rates_vec(&self) -> Vec<CustomRate> {
        serde_json::from_value(self.custom_rates.clone()).unwrap_or_default()
    }

    /// Custom rate for an instructor, if one is in effect today.
    pub fn rate_for(&self, instructor_id: Uuid, today: NaiveDate) -> Option<Decimal> {
        self.custom_rates_vec()
            .into_iter()
            .filter(|r| r.instructor_id == instructor_id && r.effective_from <= today)
            .max_by_key(|r| r.effective_from)
            .map(|r| r.rate)
    }

    /// Validate rate and threshold ranges.
    pub fn validate(&self) -> Result<(), String> {
        for (label, rate) in [
            ("default_commission_rate", self.default_commission_rate),
            ("referral_commission_rate", self.referral_commission_rate),
        ] {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(format!("{} must be within [0, 1], got {}", label, rate));
            }
        }
        if self.days_until_available < 0 {
            return Err("days_until_available must not be negative".to_string());
        }
        if self.minimum_payment_threshold < Decimal::ZERO {
            return Err("minimum_payment_threshold must not be negative".to_string());
        }
        for custom in self.custom_rates_vec() {
            if custom.rate < Decimal::ZERO || custom.rate > Decimal::ONE {
                return Err(format!(
                    "custom rate for {} must be within [0, 1], got {}",
                    custom.instructor_id, custom.rate
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(custom: Vec<CustomRate>) -> CommissionSettings {
        let (default_rate, referral_rate, days, threshold) = CommissionSettings::defaults();
        let now = chrono::Utc::now().naive_utc();
        CommissionSettings {
            id: 1,
            default_commission_rate: default_rate,
            referral_commission_rate: referral_rate,
            days_until_available: days,
            minimum_payment_threshold: threshold,
            custom_rates: serde_json::to_value(custom).unwrap(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rate_for_respects_effective_date() {
        let instructor = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let settings = settings_with(vec![CustomRate {
            instructor_id: instructor,
            rate: Decimal::new(15, 2),
            reason: "top instructor tier".to_string(),
            effective_from: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            set_by: admin,
        }]);

        // not yet effective
        assert_eq!(settings.rate_for(instructor, today), None);
        // effective
        let later = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
        assert_eq!(settings.rate_for(instructor, later), Some(Decimal::new(15, 2)));
        // unknown instructor
        assert_eq!(settings.rate_for(Uuid::new_v4(), later), None);
    }

    #[test]
    fn test_latest_effective_override_wins() {
        let instructor = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let settings = settings_with(vec![
            CustomRate {
                instructor_id: instructor,
                rate: Decimal::new(25, 2),
                reason: "initial override".to_string(),
                effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                set_by: admin,
            },
            CustomRate {
                instructor_id: instructor,
                rate: Decimal::new(18, 2),
                reason: "renegotiated".to_string(),
                effective_from: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                set_by: admin,
            },
        ]);

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(settings.rate_for(instructor, today), Some(Decimal::new(18, 2)));
    }

    #[test]
    fn test_validate_ranges() {
        let mut settings = settings_with(vec![]);
        assert!(settings.validate().is_ok());

        settings.default_commission_rate = Decimal::new(150, 2);
        assert!(settings.validate().is_err());

        settings.default_commission_rate = Decimal::new(30, 2);
        settings.days_until_available = -1;
        assert!(settings.validate().is_err());
    }
}
