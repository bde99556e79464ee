use crate::error::AppResult;
use crate::repositories::EarningRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

/// Background task that promotes pending earnings to available once their
/// grace period elapses.
///
/// One conditional bulk update per run: re-running finds nothing left to
/// promote, and a failed run leaves the remainder pending for the next
/// pass, so no compensating action is ever needed.
pub struct AvailabilitySweep {
    earning_repo: Arc<EarningRepository>,
    sweep_interval: Duration,
}

impl AvailabilitySweep {
    /// Create a new sweep with the default daily cadence.
    pub fn new(earning_repo: Arc<EarningRepository>) -> Self {
        Self {
            earning_repo,
            sweep_interval: Duration::from_secs(86_400),
        }
    }

    /// Set sweep interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Start the sweep background task
    pub async fn start(self) {
        let mut interval = time::interval(self.sweep_interval);
        info!("Availability sweep started, running every {:?}", self.sweep_interval);

        loop {
            interval.tick().await;

            match self.run_once().await {
                Ok(0) => {}
                Ok(promoted) => {
                    info!("Availability sweep promoted {} earnings", promoted);
                }
                Err(e) => {
                    error!("Availability sweep failed: {}", e);
                }
            }
        }
    }

    /// Run a single sweep pass. Also usable from an external scheduler.
    pub async fn run_once(&self) -> AppResult<u64> {
        let now = chrono::Utc::now().naive_utc();
        let promoted = self.earning_repo.mark_available_due(now).await?;
        Ok(promoted)
    }
}
