//! Equipment stock ledger.
//!
//! Every change to `quantity` or `reserved_count` goes through this module.
//! Each operation has a standalone form that runs in its own transaction and an
//! `*_in` form that joins a caller's transaction.

use std::sync::Arc;

use metrics::counter;
use uuid::Uuid;

use crate::errors::{ReservationError, ReservationResult};
use crate::models::EquipmentStock;
use crate::services::store::{ReservationStore, ReservationTx};

/// Mismatch between an equipment's `reserved_count` and its reservation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDrift {
    pub equipment_id: Uuid,
    pub reserved_count: i32,
    pub reserved_by_lines: i64,
    pub repaired: bool,
}

fn check_units(units: i32) -> ReservationResult<()> {
    shared::validation::validate_units(units).map_err(|e| {
        ReservationError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Quantity must be positive".to_string()),
        )
    })
}

/// Reserve, release and adjust equipment stock.
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn ReservationStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Reserves `quantity` units in a transaction of its own.
    pub async fn reserve(
        &self,
        equipment_id: Uuid,
        quantity: i32,
    ) -> ReservationResult<EquipmentStock> {
        let mut tx = self.store.begin().await?;
        let stock = Self::reserve_in(tx.as_mut(), equipment_id, quantity).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Releases up to `quantity` units in a transaction of its own.
    pub async fn release(
        &self,
        equipment_id: Uuid,
        quantity: i32,
    ) -> ReservationResult<EquipmentStock> {
        let mut tx = self.store.begin().await?;
        let stock = Self::release_in(tx.as_mut(), equipment_id, quantity).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Applies a signed change in a transaction of its own.
    pub async fn adjust(&self, equipment_id: Uuid, delta: i32) -> ReservationResult<EquipmentStock> {
        let mut tx = self.store.begin().await?;
        let stock = Self::adjust_in(tx.as_mut(), equipment_id, delta).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Adds owned units in a transaction of its own.
    pub async fn restock(&self, equipment_id: Uuid, units: i32) -> ReservationResult<EquipmentStock> {
        let mut tx = self.store.begin().await?;
        let stock = Self::restock_in(tx.as_mut(), equipment_id, units).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Moves `quantity` units from available to reserved.
    ///
    /// The check and the write are one conditional update in the store; there is
    /// no read-then-write window. When the update matches nothing the row is read
    /// only to classify the failure.
    pub async fn reserve_in(
        tx: &mut dyn ReservationTx,
        equipment_id: Uuid,
        quantity: i32,
    ) -> ReservationResult<EquipmentStock> {
        check_units(quantity)?;

        if let Some(stock) = tx.conditional_decrement(equipment_id, quantity).await? {
            counter!("stock_reservations_total", "outcome" => "reserved").increment(1);
            tracing::debug!(
                equipment_id = %equipment_id,
                units = quantity,
                quantity = stock.quantity,
                reserved_count = stock.reserved_count,
                "Stock reserved"
            );
            return Ok(stock);
        }

        let stock = tx
            .find_equipment(equipment_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id)))?;

        if !stock.is_reservable() {
            counter!("stock_reservations_total", "outcome" => "unavailable").increment(1);
            return Err(ReservationError::EquipmentUnavailable(equipment_id));
        }

        counter!("stock_reservations_total", "outcome" => "insufficient").increment(1);
        tracing::info!(
            equipment_id = %equipment_id,
            requested = quantity,
            available = stock.quantity,
            "Reservation refused: insufficient stock"
        );
        Err(ReservationError::InsufficientStock {
            equipment_id,
            requested: quantity,
            available: stock.quantity,
        })
    }

    /// Moves up to `quantity` units from reserved back to available.
    ///
    /// Never moves more than `reserved_count`; anything above it is dropped and
    /// logged as a double release.
    pub async fn release_in(
        tx: &mut dyn ReservationTx,
        equipment_id: Uuid,
        quantity: i32,
    ) -> ReservationResult<EquipmentStock> {
        check_units(quantity)?;

        let released = tx
            .release_stock(equipment_id, quantity)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id)))?;

        if released.moved < quantity {
            tracing::warn!(
                equipment_id = %equipment_id,
                requested = quantity,
                released = released.moved,
                "Double release detected: request exceeded reserved count"
            );
        }

        tracing::debug!(
            equipment_id = %equipment_id,
            units = released.moved,
            quantity = released.stock.quantity,
            reserved_count = released.stock.reserved_count,
            "Stock released"
        );
        Ok(released.stock)
    }

    /// Positive `delta` releases, negative reserves, zero reads the current row.
    pub async fn adjust_in(
        tx: &mut dyn ReservationTx,
        equipment_id: Uuid,
        delta: i32,
    ) -> ReservationResult<EquipmentStock> {
        match delta {
            0 => tx
                .find_equipment(equipment_id)
                .await?
                .ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id))),
            d if d > 0 => Self::release_in(tx, equipment_id, d).await,
            d => {
                let units = d.checked_neg().ok_or_else(|| {
                    ReservationError::Validation("Adjustment is out of range".to_string())
                })?;
                Self::reserve_in(tx, equipment_id, units).await
            }
        }
    }

    pub async fn restock_in(
        tx: &mut dyn ReservationTx,
        equipment_id: Uuid,
        units: i32,
    ) -> ReservationResult<EquipmentStock> {
        check_units(units)?;
        let stock = tx
            .add_stock(equipment_id, units)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id)))?;

        tracing::info!(
            equipment_id = %equipment_id,
            units = units,
            quantity = stock.quantity,
            "Equipment restocked"
        );
        Ok(stock)
    }

    /// Compares every equipment's `reserved_count` with its reservation lines.
    ///
    /// With `repair` set, drifted rows are rewritten so that `reserved_count`
    /// equals the lines while `quantity + reserved_count` stays unchanged. Rows
    /// where that would make `quantity` negative are reported but left alone.
    pub async fn reconcile(&self, repair: bool) -> ReservationResult<Vec<StockDrift>> {
        let ids = {
            let mut tx = self.store.begin().await?;
            let ids = tx.list_equipment_ids().await?;
            tx.rollback().await?;
            ids
        };

        let mut drifts = Vec::new();
        for equipment_id in ids {
            let mut tx = self.store.begin().await?;
            let Some(stock) = tx.lock_equipment(equipment_id).await? else {
                continue;
            };
            let by_lines = tx.sum_reserved_for_equipment(equipment_id).await?;
            if i64::from(stock.reserved_count) == by_lines {
                continue;
            }

            let total = i64::from(stock.total_owned());
            let new_quantity = total - by_lines;
            let repairable = new_quantity >= 0 && by_lines <= i64::from(i32::MAX);
            let mut repaired = false;

            if repair && repairable {
                tx.set_stock_counts(equipment_id, new_quantity as i32, by_lines as i32)
                    .await?;
                tx.commit().await?;
                repaired = true;
            }

            tracing::warn!(
                equipment_id = %equipment_id,
                reserved_count = stock.reserved_count,
                reserved_by_lines = by_lines,
                repaired = repaired,
                repairable = repairable,
                "Stock drift detected"
            );

            drifts.push(StockDrift {
                equipment_id,
                reserved_count: stock.reserved_count,
                reserved_by_lines: by_lines,
                repaired,
            });
        }

        Ok(drifts)
    }
}
