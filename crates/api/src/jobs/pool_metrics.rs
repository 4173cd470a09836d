//! Background job to record connection pool metrics.
//!
//! Reservation transactions keep a connection for as long as they hold row
//! locks, so a saturated pool is the first sign of contention on hot events.

use sqlx::PgPool;
use tracing::warn;

use super::scheduler::{Job, JobFrequency};

pub struct PoolMetricsJob {
    pool: PgPool,
    interval_secs: u64,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool, interval_secs: u64) -> Self {
        Self {
            pool,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let snapshot = persistence::metrics::record_pool_metrics(&self.pool);
        if snapshot.is_saturated() {
            warn!(
                active = snapshot.active,
                max = snapshot.max,
                "Database pool saturated; reservation requests are queueing"
            );
        }
        Ok(())
    }
}
