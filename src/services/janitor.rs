use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::Document;
use crate::error::AppError;
use crate::models::{Expiring, PendingCancellation, PendingRequest, PendingReschedule};
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    pub requests: usize,
    pub reschedules: usize,
    pub cancellations: usize,
}

impl PurgeStats {
    pub fn total(&self) -> usize {
        self.requests + self.reschedules + self.cancellations
    }
}

/// Drops pending records older than the retention window, whatever their status.
pub struct Janitor {
    state: AppState,
    interval: Duration,
}

impl Janitor {
    pub fn new(state: AppState, interval_secs: u64) -> Self {
        Self {
            state,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn start(self) {
        info!("Starting stale-request janitor (interval: {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;

            let now = self.state.clock.now();
            match self.sweep(now).await {
                Ok(stats) => {
                    info!(
                        "Janitor purged {} requests, {} reschedules, {} cancellations",
                        stats.requests, stats.reschedules, stats.cancellations
                    );
                }
                Err(e) => {
                    warn!("Janitor sweep failed: {:?}", e);
                }
            }
        }
    }

    /// Purges under the workflow lock so no decision sees its record vanish halfway.
    pub async fn sweep(&self, now: DateTime<FixedOffset>) -> Result<PurgeStats, AppError> {
        let _guard = self.state.workflow_lock.lock().await;
        let cutoff = now - self.state.config.retention;
        Ok(PurgeStats {
            requests: self.purge::<PendingRequest>(cutoff).await?,
            reschedules: self.purge::<PendingReschedule>(cutoff).await?,
            cancellations: self.purge::<PendingCancellation>(cutoff).await?,
        })
    }

    async fn purge<T>(&self, cutoff: DateTime<FixedOffset>) -> Result<usize, AppError>
    where
        T: Expiring,
        BTreeMap<String, T>: Document,
    {
        self.state
            .repo
            .update::<BTreeMap<String, T>, _, _>(|records| {
                let before = records.len();
                records.retain(|_, record| record.created_at() > cutoff);
                Ok(before - records.len())
            })
            .await
    }
}
