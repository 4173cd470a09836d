//! Database metrics for the reservation store.
//!
//! Query timings come from the repositories, transaction outcomes from
//! [`crate::PgReservationTx`] and pool gauges from the periodic pool job.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record database query duration.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Record how a reservation transaction ended and how long it held its locks.
pub fn record_transaction(outcome: &'static str, duration_secs: f64) {
    counter!("reservation_transactions_total", "outcome" => outcome).increment(1);
    histogram!(
        "reservation_transaction_duration_seconds",
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Point-in-time view of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSnapshot {
    pub size: u32,
    pub idle: usize,
    pub active: usize,
    pub max: u32,
}

impl PoolSnapshot {
    /// Share of the maximum pool size currently checked out, in `0.0..=1.0`.
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.active as f64 / self.max as f64).min(1.0)
    }

    /// Every connection is checked out; new reservations queue for one.
    pub fn is_saturated(&self) -> bool {
        self.max > 0 && self.active >= self.max as usize
    }
}

/// Record database connection pool gauges and return the values recorded.
pub fn record_pool_metrics(pool: &PgPool) -> PoolSnapshot {
    let size = pool.size();
    let idle = pool.num_idle();
    let snapshot = PoolSnapshot {
        size,
        idle,
        active: (size as usize).saturating_sub(idle),
        max: pool.options().get_max_connections(),
    };

    gauge!("database_connections_active").set(snapshot.active as f64);
    gauge!("database_connections_idle").set(snapshot.idle as f64);
    gauge!("database_connections_total").set(snapshot.size as f64);
    gauge!("database_pool_utilization").set(snapshot.utilization());
    snapshot
}

/// Times one repository query.
///
/// ```ignore
/// let timer = QueryTimer::new("find_event_by_id");
/// let result = sqlx::query_as::<_, EventEntity>(...).fetch_optional(conn).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}
