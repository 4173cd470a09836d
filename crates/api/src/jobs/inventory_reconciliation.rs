//! Background job comparing equipment counters with reservation lines.
//!
//! A `reserved_count` that disagrees with the sum of its reservation lines can
//! only come from writes outside the ledger or an interrupted release. The job
//! reports such drift and, when configured, repairs it.

use domain::services::InventoryLedger;
use metrics::gauge;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct InventoryReconciliationJob {
    ledger: InventoryLedger,
    interval_minutes: u64,
    repair: bool,
}

impl InventoryReconciliationJob {
    pub fn new(ledger: InventoryLedger, interval_minutes: u64, repair: bool) -> Self {
        Self {
            ledger,
            interval_minutes,
            repair,
        }
    }
}

#[async_trait::async_trait]
impl Job for InventoryReconciliationJob {
    fn name(&self) -> &'static str {
        "inventory_reconciliation"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> Result<(), String> {
        let drifts = self
            .ledger
            .reconcile(self.repair)
            .await
            .map_err(|e| e.to_string())?;

        let repaired = drifts.iter().filter(|d| d.repaired).count();
        gauge!("inventory_drift_items").set((drifts.len() - repaired) as f64);

        info!(
            drifted = drifts.len(),
            repaired = repaired,
            repair_enabled = self.repair,
            "Inventory reconciliation finished"
        );
        Ok(())
    }
}
