//! Storage abstraction for the reservation core.
//!
//! A [`ReservationStore`] hands out [`ReservationTx`] units of work. Everything
//! done through a transaction becomes visible atomically on [`ReservationTx::commit`];
//! dropping or rolling back a transaction discards all of it, which is how the
//! coordinator undoes partially applied multi-record operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    EquipmentReservation, EquipmentStatus, EquipmentStock, Event, EventCapacity, Registration,
    RegistrationStatus,
};

/// Unique index over ticket numbers.
pub const TICKET_NUMBER_CONSTRAINT: &str = "registrations_ticket_number_key";

/// Partial unique index over (event_id, user_id) for non-cancelled registrations.
pub const ACTIVE_REGISTRATION_CONSTRAINT: &str = "registrations_event_user_active_idx";

/// Result of a bounded release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasedStock {
    pub stock: EquipmentStock,
    /// Units actually moved back to `quantity`.
    pub moved: i32,
}

/// Source of transactions.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Starts a new unit of work.
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// One unit of work against the store.
///
/// Methods returning `Option` yield `None` when the addressed record does not
/// exist (or, for the conditional stock update, when the condition failed).
#[async_trait]
pub trait ReservationTx: Send {
    // Equipment

    async fn insert_equipment(&mut self, equipment: &EquipmentStock) -> Result<(), StoreError>;

    async fn find_equipment(&mut self, id: Uuid) -> Result<Option<EquipmentStock>, StoreError>;

    /// Reads the equipment row and holds it until the transaction ends.
    async fn lock_equipment(&mut self, id: Uuid) -> Result<Option<EquipmentStock>, StoreError>;

    async fn list_equipment_ids(&mut self) -> Result<Vec<Uuid>, StoreError>;

    /// Moves `units` from `quantity` to `reserved_count` in one conditional write,
    /// only if the equipment is approved and `quantity >= units`.
    async fn conditional_decrement(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentStock>, StoreError>;

    /// Moves `min(units, reserved_count)` from `reserved_count` back to `quantity`.
    async fn release_stock(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<ReleasedStock>, StoreError>;

    /// Adds owned units to `quantity`.
    async fn add_stock(&mut self, id: Uuid, units: i32)
        -> Result<Option<EquipmentStock>, StoreError>;

    /// Overwrites both counters. Only used by reconciliation repair.
    async fn set_stock_counts(
        &mut self,
        id: Uuid,
        quantity: i32,
        reserved_count: i32,
    ) -> Result<Option<EquipmentStock>, StoreError>;

    async fn set_equipment_status(
        &mut self,
        id: Uuid,
        status: EquipmentStatus,
    ) -> Result<Option<EquipmentStock>, StoreError>;

    async fn delete_equipment(&mut self, id: Uuid) -> Result<bool, StoreError>;

    /// Sum of `quantity_reserved` over all lines referencing the equipment.
    async fn sum_reserved_for_equipment(&mut self, id: Uuid) -> Result<i64, StoreError>;

    // Events

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError>;

    async fn find_event(&mut self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Reads the event and holds it until the transaction ends.
    async fn lock_event(&mut self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn save_capacity(&mut self, capacity: &EventCapacity) -> Result<(), StoreError>;

    async fn delete_event(&mut self, id: Uuid) -> Result<bool, StoreError>;

    // Reservation lines

    async fn insert_line(&mut self, line: &EquipmentReservation) -> Result<(), StoreError>;

    async fn find_line(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> Result<Option<EquipmentReservation>, StoreError>;

    async fn list_lines(&mut self, event_id: Uuid)
        -> Result<Vec<EquipmentReservation>, StoreError>;

    async fn update_line_quantity(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
        quantity: i32,
    ) -> Result<Option<EquipmentReservation>, StoreError>;

    async fn delete_line(&mut self, event_id: Uuid, equipment_id: Uuid)
        -> Result<bool, StoreError>;

    async fn delete_lines_for_event(&mut self, event_id: Uuid) -> Result<u64, StoreError>;

    // Registrations

    async fn find_active_registration(
        &mut self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError>;

    async fn ticket_exists(&mut self, ticket_number: &str) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] naming [`TICKET_NUMBER_CONSTRAINT`]
    /// or [`ACTIVE_REGISTRATION_CONSTRAINT`] when either index rejects the row.
    async fn insert_registration(&mut self, registration: &Registration)
        -> Result<(), StoreError>;

    async fn find_registration(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError>;

    /// Reads the registration and holds it until the transaction ends.
    async fn lock_registration(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError>;

    async fn set_registration_status(
        &mut self,
        id: Uuid,
        status: RegistrationStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Registration>, StoreError>;

    async fn find_waitlisted_registration(
        &mut self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError>;

    async fn list_active_registrations(
        &mut self,
        event_id: Uuid,
    ) -> Result<Vec<Registration>, StoreError>;

    async fn delete_registrations_for_event(&mut self, event_id: Uuid) -> Result<u64, StoreError>;

    // Lifecycle

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
