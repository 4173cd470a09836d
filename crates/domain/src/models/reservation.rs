//! Equipment reservation line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Units of one equipment item held by one event.
///
/// `unit_price_at_reservation` is captured when the line is created and is not
/// re-read from the equipment afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EquipmentReservation {
    pub event_id: Uuid,
    pub equipment_id: Uuid,
    pub quantity_reserved: i32,
    pub unit_price_at_reservation: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EquipmentReservation {
    pub fn new(event_id: Uuid, equipment_id: Uuid, quantity: i32, unit_price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            event_id,
            equipment_id,
            quantity_reserved: quantity,
            unit_price_at_reservation: unit_price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line_cost(&self) -> Decimal {
        self.unit_price_at_reservation * Decimal::from(self.quantity_reserved)
    }
}
