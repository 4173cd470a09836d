//! Background job scheduler and job implementations.

mod inventory_reconciliation;
mod pool_metrics;
mod scheduler;

pub use inventory_reconciliation::InventoryReconciliationJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
