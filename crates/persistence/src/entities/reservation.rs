//! Event equipment line entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::EquipmentReservation;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the event_equipment table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEquipmentEntity {
    pub event_id: Uuid,
    pub equipment_id: Uuid,
    pub quantity_reserved: i32,
    pub unit_price_at_reservation: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventEquipmentEntity> for EquipmentReservation {
    fn from(entity: EventEquipmentEntity) -> Self {
        Self {
            event_id: entity.event_id,
            equipment_id: entity.equipment_id,
            quantity_reserved: entity.quantity_reserved,
            unit_price_at_reservation: entity.unit_price_at_reservation,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
