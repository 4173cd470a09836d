//! Vendor equipment listings and admin moderation.
//!
//! Status changes only decide whether equipment can be reserved; they never
//! touch `quantity` or `reserved_count`.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ReservationError, ReservationResult};
use crate::models::{CreateEquipmentRequest, EquipmentStatus, EquipmentStock};
use crate::services::inventory_ledger::InventoryLedger;
use crate::services::store::ReservationStore;

#[derive(Clone)]
pub struct EquipmentCatalog {
    store: Arc<dyn ReservationStore>,
    ledger: InventoryLedger,
}

impl EquipmentCatalog {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            store,
        }
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    /// Creates a listing awaiting moderation.
    pub async fn list_equipment(
        &self,
        vendor_id: Uuid,
        request: CreateEquipmentRequest,
    ) -> ReservationResult<EquipmentStock> {
        request.validate()?;
        if shared::validation::validate_not_blank(&request.name).is_err() {
            return Err(ReservationError::Validation(
                "name: Value must not be blank".into(),
            ));
        }
        if shared::validation::validate_unit_price(&request.unit_price).is_err() {
            return Err(ReservationError::Validation(
                "unit_price: Price must be non-negative".into(),
            ));
        }

        let now = Utc::now();
        let equipment = EquipmentStock {
            id: Uuid::new_v4(),
            vendor_id,
            name: request.name.trim().to_string(),
            description: request.description,
            quantity: request.quantity,
            reserved_count: 0,
            unit_price: request.unit_price,
            status: EquipmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_equipment(&equipment).await?;
        tx.commit().await?;

        tracing::info!(
            equipment_id = %equipment.id,
            vendor_id = %vendor_id,
            quantity = equipment.quantity,
            "Equipment listed"
        );
        Ok(equipment)
    }

    pub async fn get_equipment(&self, equipment_id: Uuid) -> ReservationResult<EquipmentStock> {
        let mut tx = self.store.begin().await?;
        let found = tx.find_equipment(equipment_id).await?;
        tx.rollback().await?;
        found.ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id)))
    }

    /// Admin approval or rejection.
    pub async fn set_status(
        &self,
        equipment_id: Uuid,
        status: EquipmentStatus,
    ) -> ReservationResult<EquipmentStock> {
        let mut tx = self.store.begin().await?;
        let updated = tx
            .set_equipment_status(equipment_id, status)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id)))?;
        tx.commit().await?;

        tracing::info!(equipment_id = %equipment_id, status = %status, "Equipment status changed");
        Ok(updated)
    }

    pub async fn restock(&self, equipment_id: Uuid, units: i32) -> ReservationResult<EquipmentStock> {
        self.ledger.restock(equipment_id, units).await
    }

    /// Deletes a listing that no event holds a reservation on.
    pub async fn delete_equipment(&self, equipment_id: Uuid) -> ReservationResult<()> {
        let mut tx = self.store.begin().await?;
        tx.lock_equipment(equipment_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Equipment {}", equipment_id)))?;

        if tx.sum_reserved_for_equipment(equipment_id).await? > 0 {
            return Err(ReservationError::EquipmentInUse(equipment_id));
        }

        tx.delete_equipment(equipment_id).await?;
        tx.commit().await?;

        tracing::info!(equipment_id = %equipment_id, "Equipment deleted");
        Ok(())
    }
}
