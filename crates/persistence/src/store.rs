//! PostgreSQL implementation of the reservation store.
//!
//! Each [`PgReservationTx`] wraps one database transaction. Row locks taken with
//! `FOR UPDATE` are held until commit or rollback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{
    EquipmentReservation, EquipmentStatus, EquipmentStock, Event, EventCapacity, Registration,
    RegistrationStatus,
};
use domain::services::{ReleasedStock, ReservationStore, ReservationTx};
use domain::StoreError;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use std::time::Instant;
use uuid::Uuid;

use crate::entities::RegistrationStatusDb;
use crate::metrics::record_transaction;
use crate::repositories::{
    EquipmentRepository, EventEquipmentRepository, EventRepository, RegistrationRepository,
};

/// Reservation store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgReservationTx {
            tx,
            started: Instant::now(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One open database transaction.
pub struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
    started: Instant,
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    // ===========================================
    // Equipment
    // ===========================================

    async fn insert_equipment(&mut self, equipment: &EquipmentStock) -> Result<(), StoreError> {
        EquipmentRepository::insert(&mut self.tx, equipment).await?;
        Ok(())
    }

    async fn find_equipment(&mut self, id: Uuid) -> Result<Option<EquipmentStock>, StoreError> {
        let row = EquipmentRepository::find_by_id(&mut self.tx, id).await?;
        Ok(row.map(Into::into))
    }

    async fn lock_equipment(&mut self, id: Uuid) -> Result<Option<EquipmentStock>, StoreError> {
        let row = EquipmentRepository::lock_by_id(&mut self.tx, id).await?;
        Ok(row.map(Into::into))
    }

    async fn list_equipment_ids(&mut self) -> Result<Vec<Uuid>, StoreError> {
        Ok(EquipmentRepository::list_ids(&mut self.tx).await?)
    }

    async fn conditional_decrement(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        let row = EquipmentRepository::conditional_decrement(&mut self.tx, id, units).await?;
        Ok(row.map(Into::into))
    }

    async fn release_stock(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<ReleasedStock>, StoreError> {
        let released = EquipmentRepository::release(&mut self.tx, id, units).await?;
        Ok(released.map(|(row, moved)| ReleasedStock {
            stock: row.into(),
            moved,
        }))
    }

    async fn add_stock(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        let row = EquipmentRepository::add_stock(&mut self.tx, id, units).await?;
        Ok(row.map(Into::into))
    }

    async fn set_stock_counts(
        &mut self,
        id: Uuid,
        quantity: i32,
        reserved_count: i32,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        let row = EquipmentRepository::set_counts(&mut self.tx, id, quantity, reserved_count).await?;
        Ok(row.map(Into::into))
    }

    async fn set_equipment_status(
        &mut self,
        id: Uuid,
        status: EquipmentStatus,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        let row = EquipmentRepository::set_status(&mut self.tx, id, status).await?;
        Ok(row.map(Into::into))
    }

    async fn delete_equipment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        Ok(EquipmentRepository::delete(&mut self.tx, id).await?)
    }

    async fn sum_reserved_for_equipment(&mut self, id: Uuid) -> Result<i64, StoreError> {
        Ok(EventEquipmentRepository::sum_reserved_for_equipment(&mut self.tx, id).await?)
    }

    // ===========================================
    // Events
    // ===========================================

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        EventRepository::insert(&mut self.tx, event).await?;
        Ok(())
    }

    async fn find_event(&mut self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let row = EventRepository::find_by_id(&mut self.tx, id).await?;
        Ok(row.map(Into::into))
    }

    async fn lock_event(&mut self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let row = EventRepository::lock_by_id(&mut self.tx, id).await?;
        Ok(row.map(Into::into))
    }

    async fn save_capacity(&mut self, capacity: &EventCapacity) -> Result<(), StoreError> {
        if !EventRepository::save_capacity(&mut self.tx, capacity).await? {
            return Err(StoreError::Integrity(format!(
                "event {} vanished while locked",
                capacity.event_id
            )));
        }
        Ok(())
    }

    async fn delete_event(&mut self, id: Uuid) -> Result<bool, StoreError> {
        Ok(EventRepository::delete(&mut self.tx, id).await?)
    }

    // ===========================================
    // Reservation lines
    // ===========================================

    async fn insert_line(&mut self, line: &EquipmentReservation) -> Result<(), StoreError> {
        EventEquipmentRepository::insert(&mut self.tx, line).await?;
        Ok(())
    }

    async fn find_line(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> Result<Option<EquipmentReservation>, StoreError> {
        let row = EventEquipmentRepository::find(&mut self.tx, event_id, equipment_id).await?;
        Ok(row.map(Into::into))
    }

    async fn list_lines(
        &mut self,
        event_id: Uuid,
    ) -> Result<Vec<EquipmentReservation>, StoreError> {
        let rows = EventEquipmentRepository::find_by_event(&mut self.tx, event_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_line_quantity(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
        quantity: i32,
    ) -> Result<Option<EquipmentReservation>, StoreError> {
        let row =
            EventEquipmentRepository::update_quantity(&mut self.tx, event_id, equipment_id, quantity)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_line(&mut self, event_id: Uuid, equipment_id: Uuid) -> Result<bool, StoreError> {
        Ok(EventEquipmentRepository::delete(&mut self.tx, event_id, equipment_id).await?)
    }

    async fn delete_lines_for_event(&mut self, event_id: Uuid) -> Result<u64, StoreError> {
        Ok(EventEquipmentRepository::delete_by_event(&mut self.tx, event_id).await?)
    }

    // ===========================================
    // Registrations
    // ===========================================

    async fn find_active_registration(
        &mut self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let row = RegistrationRepository::find_active(&mut self.tx, event_id, user_id).await?;
        Ok(row.map(Into::into))
    }

    async fn ticket_exists(&mut self, ticket_number: &str) -> Result<bool, StoreError> {
        Ok(RegistrationRepository::ticket_exists(&mut self.tx, ticket_number).await?)
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        let status = RegistrationStatusDb::try_from(registration.status)?;

        // A unique violation aborts the enclosing transaction, so the insert
        // runs under a savepoint and only the savepoint is rolled back.
        let mut savepoint = Connection::begin(&mut *self.tx).await?;
        let inserted = RegistrationRepository::insert(
            &mut savepoint,
            registration.id,
            registration.event_id,
            registration.user_id,
            &registration.ticket_number,
            status,
            registration.created_at,
            registration.cancelled_at,
        )
        .await;

        match inserted {
            Ok(()) => {
                savepoint.commit().await?;
                Ok(())
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn find_registration(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let row = RegistrationRepository::find_by_id(&mut self.tx, id).await?;
        Ok(row.map(Into::into))
    }

    async fn lock_registration(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let row = RegistrationRepository::lock_by_id(&mut self.tx, id).await?;
        Ok(row.map(Into::into))
    }

    async fn set_registration_status(
        &mut self,
        id: Uuid,
        status: RegistrationStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Registration>, StoreError> {
        let status = RegistrationStatusDb::try_from(status)?;
        let row = RegistrationRepository::set_status(&mut self.tx, id, status, cancelled_at).await?;
        Ok(row.map(Into::into))
    }

    async fn find_waitlisted_registration(
        &mut self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let row = RegistrationRepository::find_waitlisted(&mut self.tx, event_id, user_id).await?;
        Ok(row.map(Into::into))
    }

    async fn list_active_registrations(
        &mut self,
        event_id: Uuid,
    ) -> Result<Vec<Registration>, StoreError> {
        let rows = RegistrationRepository::find_active_by_event(&mut self.tx, event_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_registrations_for_event(&mut self, event_id: Uuid) -> Result<u64, StoreError> {
        Ok(RegistrationRepository::delete_by_event(&mut self.tx, event_id).await?)
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let started = self.started;
        let result = self.tx.commit().await;
        let outcome = if result.is_ok() { "commit" } else { "commit_failed" };
        record_transaction(outcome, started.elapsed().as_secs_f64());
        result?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let started = self.started;
        self.tx.rollback().await?;
        record_transaction("rollback", started.elapsed().as_secs_f64());
        Ok(())
    }
}
