//! Equipment entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{EquipmentStatus, EquipmentStock};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for equipment_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "equipment_status", rename_all = "lowercase")]
pub enum EquipmentStatusDb {
    Pending,
    Approved,
    Rejected,
}

impl From<EquipmentStatusDb> for EquipmentStatus {
    fn from(db_status: EquipmentStatusDb) -> Self {
        match db_status {
            EquipmentStatusDb::Pending => EquipmentStatus::Pending,
            EquipmentStatusDb::Approved => EquipmentStatus::Approved,
            EquipmentStatusDb::Rejected => EquipmentStatus::Rejected,
        }
    }
}

impl From<EquipmentStatus> for EquipmentStatusDb {
    fn from(status: EquipmentStatus) -> Self {
        match status {
            EquipmentStatus::Pending => EquipmentStatusDb::Pending,
            EquipmentStatus::Approved => EquipmentStatusDb::Approved,
            EquipmentStatus::Rejected => EquipmentStatusDb::Rejected,
        }
    }
}

/// Database row mapping for the equipment table.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentEntity {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub description: String,
    pub quantity: i32,
    pub reserved_count: i32,
    pub unit_price: Decimal,
    pub status: EquipmentStatusDb,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EquipmentEntity> for EquipmentStock {
    fn from(entity: EquipmentEntity) -> Self {
        Self {
            id: entity.id,
            vendor_id: entity.vendor_id,
            name: entity.name,
            description: entity.description,
            quantity: entity.quantity,
            reserved_count: entity.reserved_count,
            unit_price: entity.unit_price,
            status: entity.status.into(),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_round_trip() {
        for status in [
            EquipmentStatus::Pending,
            EquipmentStatus::Approved,
            EquipmentStatus::Rejected,
        ] {
            let db: EquipmentStatusDb = status.into();
            assert_eq!(EquipmentStatus::from(db), status);
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let entity = EquipmentEntity {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            name: "Projector".to_string(),
            description: "4K".to_string(),
            quantity: 3,
            reserved_count: 2,
            unit_price: Decimal::new(9900, 2),
            status: EquipmentStatusDb::Approved,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let stock: EquipmentStock = entity.clone().into();
        assert_eq!(stock.id, entity.id);
        assert_eq!(stock.total_owned(), 5);
        assert!(stock.is_reservable());
    }
}
