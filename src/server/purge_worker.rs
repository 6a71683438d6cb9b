use crate::application_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically deletes refresh records that expired longer ago than the grace
/// window. Skipping a run never affects correctness, so errors only get logged.
pub struct PurgeWorker {
    token_service: Arc<dyn TokenService>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl PurgeWorker {
    pub fn new(
        token_service: Arc<dyn TokenService>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            token_service,
            interval,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) -> Result<u64, TokenError> {
        self.token_service
            .purge_expired(&self.cancellation_token)
            .await
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("purge worker shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(_) => {}
                        Err(TokenError::Cancelled) => {}
                        Err(e) => tracing::error!("purge worker error: {}", e),
                    }
                }
            }
        }
    }
}
