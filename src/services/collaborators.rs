//! External collaborator gateways.
//!
//! Coupon validation and enrollment revocation belong to other systems;
//! the settlement engine talks to them through these traits so it stays
//! testable in isolation.

use crate::models::ProductKind;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Validates referral coupons against the coupon service.
#[async_trait]
pub trait CouponGateway: Send + Sync {
    /// Whether `code` is a referral coupon belonging to this instructor and
    /// this product.
    async fn validate_referral(&self, code: &str, instructor_id: Uuid, product_id: Uuid) -> bool;
}

/// HTTP-backed coupon validation.
pub struct HttpCouponGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCouponGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CouponGateway for HttpCouponGateway {
    async fn validate_referral(&self, code: &str, instructor_id: Uuid, product_id: Uuid) -> bool {
        let url = format!("{}/coupons/validate", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("code", code.to_string()),
                ("instructor_id", instructor_id.to_string()),
                ("product_id", product_id.to_string()),
            ])
            .timeout(Duration::from_secs(2))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<serde_json::Value>().await {
                    Ok(body) => body
                        .get("valid")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    Err(e) => {
                        warn!("Coupon service returned malformed body: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Coupon service returned status {}", response.status());
                false
            }
            Err(e) => {
                // Fail closed: an unverifiable referral gets the default rate
                warn!("Coupon service query failed: {}", e);
                false
            }
        }
    }
}

/// Gateway used when no coupon service is configured. Referral codes are
/// never validated, so the default rate always applies.
pub struct DisabledCouponGateway;

#[async_trait]
impl CouponGateway for DisabledCouponGateway {
    async fn validate_referral(&self, code: &str, _instructor_id: Uuid, _product_id: Uuid) -> bool {
        warn!("Coupon service not configured; referral code {} not validated", code);
        false
    }
}

/// Revokes content access for a refunded line item.
#[async_trait]
pub trait EnrollmentGateway: Send + Sync {
    async fn revoke_access(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        kind: ProductKind,
    ) -> Result<(), String>;
}

/// Gateway used when no enrollment service is configured; revocations are
/// logged for manual follow-up.
pub struct NoopEnrollmentGateway;

#[async_trait]
impl EnrollmentGateway for NoopEnrollmentGateway {
    async fn revoke_access(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        kind: ProductKind,
    ) -> Result<(), String> {
        warn!(
            "Enrollment service not configured; access to {} {} for user {} must be revoked manually",
            kind.as_str(),
            product_id,
            user_id
        );
        Ok(())
    }
}
