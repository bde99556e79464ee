//! Withholding estimate and fiscal audit trail.
//!
//! The breakdown is an internal audit approximation, not a filing record.
//! It lives behind `WithholdingPolicy` so a per-jurisdiction policy can be
//! substituted without touching the settlement state machine.

use crate::commission::round2;
use crate::error::{AppError, AppResult};
use crate::models::{Earning, FiscalBreakdown};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Estimates tax withholding on an instructor payout amount.
pub trait WithholdingPolicy: Send + Sync {
    fn breakdown(&self, gross: Decimal) -> FiscalBreakdown;
}

/// Flat-percentage withholding estimate.
#[derive(Debug, Clone, Copy)]
pub struct FlatRateWithholding {
    pub income_tax_rate: Decimal,
    pub vat_withholding_rate: Decimal,
}

impl Default for FlatRateWithholding {
    fn default() -> Self {
        Self {
            income_tax_rate: Decimal::new(10, 2),     // 10%
            vat_withholding_rate: Decimal::new(8, 2), // 8%
        }
    }
}

impl WithholdingPolicy for FlatRateWithholding {
    fn breakdown(&self, gross: Decimal) -> FiscalBreakdown {
        let gross = round2(gross.max(Decimal::ZERO));
        let income_tax_withheld = round2(gross * self.income_tax_rate);
        let vat_withheld = round2(gross * self.vat_withholding_rate);
        // Net is the exact remainder so the snapshot reconciles
        let net_after_withholding = gross - income_tax_withheld - vat_withheld;

        FiscalBreakdown {
            gross,
            income_tax_withheld,
            vat_withheld,
            net_after_withholding,
        }
    }
}

/// Fiscal audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalAuditEntry {
    pub timestamp: i64,
    pub event_type: String, // "earning_recorded", "earning_refunded", etc.
    pub earning_id: Uuid,
    pub instructor_id: Uuid,
    pub details: serde_json::Value,
}

/// Append-only fiscal audit trail, one JSON line per event.
///
/// This is a reporting side channel: failures are surfaced to the caller
/// but must never fail the settlement operation that produced the event.
pub struct FiscalAuditService {
    #[allow(dead_code)]
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl FiscalAuditService {
    /// Create a new fiscal audit service writing to a dated file.
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("fiscal_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open fiscal log file: {}", e)))?;

        info!("Fiscal audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    /// Log an audit entry
    pub async fn log(&self, entry: FiscalAuditEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry).map_err(AppError::Serialization)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write fiscal log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush fiscal log: {}", e)))?;

        Ok(())
    }

    /// Log the withholding snapshot captured for a new earning.
    pub async fn log_earning_recorded(&self, earning: &Earning) -> AppResult<()> {
        let entry = FiscalAuditEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "earning_recorded".to_string(),
            earning_id: earning.id,
            instructor_id: earning.instructor_id,
            details: serde_json::json!({
                "sale_id": earning.sale_id,
                "product_id": earning.product_id,
                "instructor_earning": earning.instructor_earning.to_string(),
                "fiscal": earning.fiscal,
            }),
        };

        self.log(entry).await
    }

    /// Log the reversal of an earning through a refund.
    pub async fn log_earning_refunded(&self, earning: &Earning, refund_id: Uuid) -> AppResult<()> {
        let entry = FiscalAuditEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "earning_refunded".to_string(),
            earning_id: earning.id,
            instructor_id: earning.instructor_id,
            details: serde_json::json!({
                "refund_id": refund_id,
                "instructor_earning": earning.instructor_earning.to_string(),
            }),
        };

        self.log(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_rate_breakdown_reconciles() {
        let policy = FlatRateWithholding::default();
        for cents in [1i64, 99, 677, 1000, 123_456] {
            let gross = Decimal::new(cents, 2);
            let b = policy.breakdown(gross);
            assert_eq!(
                b.income_tax_withheld + b.vat_withheld + b.net_after_withholding,
                b.gross,
                "gross={}",
                gross
            );
        }
    }

    #[test]
    fn test_negative_gross_clamped() {
        let policy = FlatRateWithholding::default();
        let b = policy.breakdown(Decimal::new(-500, 2));
        assert_eq!(b.gross, Decimal::ZERO);
        assert_eq!(b.net_after_withholding, Decimal::ZERO);
    }
}
