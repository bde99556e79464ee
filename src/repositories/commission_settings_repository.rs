//! Repository for the singleton commission policy.
//!
//! Reads take no lock: the policy is read on every earning-creation call
//! and mutated rarely by administrators, and stale-by-seconds reads are
//! acceptable.

use crate::error::RepositoryError;
use crate::models::{CommissionSettings, CustomRate};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const SETTINGS_COLUMNS: &str = r#"id, default_commission_rate, referral_commission_rate,
       days_until_available, minimum_payment_threshold, custom_rates,
       updated_by, created_at, updated_at"#;

pub struct CommissionSettingsRepository {
    pool: PgPool,
}

impl CommissionSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the singleton policy, lazily creating it with platform
    /// defaults on first access.
    pub async fn get_or_create(&self) -> Result<CommissionSettings, RepositoryError> {
        let sql = format!("SELECT {} FROM commission_settings WHERE id = 1", SETTINGS_COLUMNS);
        let existing = sqlx::query_as::<_, CommissionSettings>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(settings) = existing {
            return Ok(settings);
        }

        let (default_rate, referral_rate, days, threshold) = CommissionSettings::defaults();

        let sql = format!(
            r#"
            INSERT INTO commission_settings
            (id, default_commission_rate, referral_commission_rate,
             days_until_available, minimum_payment_threshold, custom_rates)
            VALUES (1, $1, $2, $3, $4, '[]'::jsonb)
            ON CONFLICT (id) DO UPDATE SET updated_at = NOW()
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        );

        let settings = sqlx::query_as::<_, CommissionSettings>(&sql)
            .bind(default_rate)
            .bind(referral_rate)
            .bind(days)
            .bind(threshold)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }

    /// Update the scalar policy fields, stamping the acting administrator.
    pub async fn update(
        &self,
        default_commission_rate: Decimal,
        referral_commission_rate: Decimal,
        days_until_available: i32,
        minimum_payment_threshold: Decimal,
        admin_id: Uuid,
    ) -> Result<CommissionSettings, RepositoryError> {
        // Ensure the singleton exists before updating it
        self.get_or_create().await?;

        let sql = format!(
            r#"
            UPDATE commission_settings
            SET default_commission_rate = $1,
                referral_commission_rate = $2,
                days_until_available = $3,
                minimum_payment_threshold = $4,
                updated_by = $5,
                updated_at = NOW()
            WHERE id = 1
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        );

        let settings = sqlx::query_as::<_, CommissionSettings>(&sql)
            .bind(default_commission_rate)
            .bind(referral_commission_rate)
            .bind(days_until_available)
            .bind(minimum_payment_threshold)
            .bind(admin_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }

    /// Add or replace an instructor's custom-rate override.
    pub async fn upsert_custom_rate(
        &self,
        custom: CustomRate,
        admin_id: Uuid,
    ) -> Result<CommissionSettings, RepositoryError> {
        let current = self.get_or_create().await?;

        let mut rates: Vec<CustomRate> = current.custom_rates_vec();
        rates.retain(|r| r.instructor_id != custom.instructor_id);
        rates.push(custom);

        self.replace_custom_rates(rates, admin_id).await
    }

    /// Remove an instructor's custom-rate override, restoring the default.
    pub async fn remove_custom_rate(
        &self,
        instructor_id: Uuid,
        admin_id: Uuid,
    ) -> Result<CommissionSettings, RepositoryError> {
        let current = self.get_or_create().await?;

        let mut rates: Vec<CustomRate> = current.custom_rates_vec();
        rates.retain(|r| r.instructor_id != instructor_id);

        self.replace_custom_rates(rates, admin_id).await
    }

    async fn replace_custom_rates(
        &self,
        rates: Vec<CustomRate>,
        admin_id: Uuid,
    ) -> Result<CommissionSettings, RepositoryError> {
        let rates_json = serde_json::to_value(&rates)
            .map_err(|e| RepositoryError::InvalidInput(e.to_string()))?;

        let sql = format!(
            r#"
            UPDATE commission_settings
            SET custom_rates = $1, updated_by = $2, updated_at = NOW()
            WHERE id = 1
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        );

        let settings = sqlx::query_as::<_, CommissionSettings>(&sql)
            .bind(rates_json)
            .bind(admin_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }
}
