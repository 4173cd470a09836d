//! In-memory [`ReservationStore`] used by tests and local tooling.
//!
//! Transactions are serialized behind one async mutex. Each transaction works
//! on a copy of the state and writes it back only on commit, so dropping a
//! transaction discards everything it did.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    EquipmentReservation, EquipmentStatus, EquipmentStock, Event, EventCapacity, Registration,
    RegistrationStatus,
};
use crate::services::store::{
    ReleasedStock, ReservationStore, ReservationTx, ACTIVE_REGISTRATION_CONSTRAINT,
    TICKET_NUMBER_CONSTRAINT,
};

/// Full contents of the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub equipment: HashMap<Uuid, EquipmentStock>,
    pub events: HashMap<Uuid, Event>,
    pub lines: BTreeMap<(Uuid, Uuid), EquipmentReservation>,
    pub registrations: HashMap<Uuid, Registration>,
}

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Begin,
    ConditionalDecrement,
    ReleaseStock,
    InsertEvent,
    SaveCapacity,
    DeleteEvent,
    InsertLine,
    UpdateLine,
    InsertRegistration,
    SetRegistrationStatus,
    Commit,
}

type FailurePlan = Arc<StdMutex<HashMap<FailurePoint, usize>>>;

fn check_failure(plan: &FailurePlan, point: FailurePoint) -> Result<(), StoreError> {
    let mut plan = plan.lock().unwrap_or_else(|e| e.into_inner());
    match plan.get_mut(&point) {
        Some(0) => {
            plan.remove(&point);
            Err(StoreError::Unavailable(format!(
                "injected failure at {:?}",
                point
            )))
        }
        Some(skip) => {
            *skip -= 1;
            Ok(())
        }
        None => Ok(()),
    }
}

/// In-memory reservation store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
    failures: FailurePlan,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the call to `point` fail after `skip` successful calls.
    pub fn inject_failure(&self, point: FailurePoint, skip: usize) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(point, skip);
    }

    /// Seeds an equipment row directly, bypassing any service.
    pub async fn put_equipment(&self, equipment: EquipmentStock) {
        self.state
            .lock()
            .await
            .equipment
            .insert(equipment.id, equipment);
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        check_failure(&self.failures, FailurePoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            working,
            failures: self.failures.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        check_failure(&self.failures, FailurePoint::Begin)
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failures: FailurePlan,
}

impl InMemoryTx {
    fn fail_at(&self, point: FailurePoint) -> Result<(), StoreError> {
        check_failure(&self.failures, point)
    }

    fn equipment_mut(&mut self, id: Uuid) -> Option<&mut EquipmentStock> {
        self.working.equipment.get_mut(&id)
    }
}

#[async_trait]
impl ReservationTx for InMemoryTx {
    async fn insert_equipment(&mut self, equipment: &EquipmentStock) -> Result<(), StoreError> {
        if self.working.equipment.contains_key(&equipment.id) {
            return Err(StoreError::UniqueViolation("equipment_pkey".into()));
        }
        self.working
            .equipment
            .insert(equipment.id, equipment.clone());
        Ok(())
    }

    async fn find_equipment(&mut self, id: Uuid) -> Result<Option<EquipmentStock>, StoreError> {
        Ok(self.working.equipment.get(&id).cloned())
    }

    async fn lock_equipment(&mut self, id: Uuid) -> Result<Option<EquipmentStock>, StoreError> {
        Ok(self.working.equipment.get(&id).cloned())
    }

    async fn list_equipment_ids(&mut self) -> Result<Vec<Uuid>, StoreError> {
        let mut ids: Vec<Uuid> = self.working.equipment.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn conditional_decrement(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        self.fail_at(FailurePoint::ConditionalDecrement)?;
        let Some(stock) = self.equipment_mut(id) else {
            return Ok(None);
        };
        if stock.status != EquipmentStatus::Approved || stock.quantity < units {
            return Ok(None);
        }
        stock.quantity -= units;
        stock.reserved_count += units;
        stock.updated_at = Utc::now();
        Ok(Some(stock.clone()))
    }

    async fn release_stock(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<ReleasedStock>, StoreError> {
        self.fail_at(FailurePoint::ReleaseStock)?;
        let Some(stock) = self.equipment_mut(id) else {
            return Ok(None);
        };
        let moved = units.min(stock.reserved_count);
        stock.reserved_count -= moved;
        stock.quantity += moved;
        stock.updated_at = Utc::now();
        Ok(Some(ReleasedStock {
            stock: stock.clone(),
            moved,
        }))
    }

    async fn add_stock(
        &mut self,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        let Some(stock) = self.equipment_mut(id) else {
            return Ok(None);
        };
        stock.quantity = stock
            .quantity
            .checked_add(units)
            .ok_or_else(|| StoreError::Integrity("quantity overflow".into()))?;
        stock.updated_at = Utc::now();
        Ok(Some(stock.clone()))
    }

    async fn set_stock_counts(
        &mut self,
        id: Uuid,
        quantity: i32,
        reserved_count: i32,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        if quantity < 0 || reserved_count < 0 {
            return Err(StoreError::Integrity("stock counters must be non-negative".into()));
        }
        let Some(stock) = self.equipment_mut(id) else {
            return Ok(None);
        };
        stock.quantity = quantity;
        stock.reserved_count = reserved_count;
        stock.updated_at = Utc::now();
        Ok(Some(stock.clone()))
    }

    async fn set_equipment_status(
        &mut self,
        id: Uuid,
        status: EquipmentStatus,
    ) -> Result<Option<EquipmentStock>, StoreError> {
        let Some(stock) = self.equipment_mut(id) else {
            return Ok(None);
        };
        stock.status = status;
        stock.updated_at = Utc::now();
        Ok(Some(stock.clone()))
    }

    async fn delete_equipment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        if self.working.lines.keys().any(|(_, equipment_id)| *equipment_id == id) {
            return Err(StoreError::Integrity(
                "equipment is referenced by reservation lines".into(),
            ));
        }
        Ok(self.working.equipment.remove(&id).is_some())
    }

    async fn sum_reserved_for_equipment(&mut self, id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .working
            .lines
            .values()
            .filter(|line| line.equipment_id == id)
            .map(|line| i64::from(line.quantity_reserved))
            .sum())
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        self.fail_at(FailurePoint::InsertEvent)?;
        if self.working.events.contains_key(&event.id) {
            return Err(StoreError::UniqueViolation("events_pkey".into()));
        }
        self.working.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_event(&mut self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn lock_event(&mut self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn save_capacity(&mut self, capacity: &EventCapacity) -> Result<(), StoreError> {
        self.fail_at(FailurePoint::SaveCapacity)?;
        let event = self
            .working
            .events
            .get_mut(&capacity.event_id)
            .ok_or_else(|| StoreError::Integrity(format!("event {} vanished", capacity.event_id)))?;
        event.capacity = capacity.clone();
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_event(&mut self, id: Uuid) -> Result<bool, StoreError> {
        self.fail_at(FailurePoint::DeleteEvent)?;
        Ok(self.working.events.remove(&id).is_some())
    }

    async fn insert_line(&mut self, line: &EquipmentReservation) -> Result<(), StoreError> {
        self.fail_at(FailurePoint::InsertLine)?;
        let key = (line.event_id, line.equipment_id);
        if self.working.lines.contains_key(&key) {
            return Err(StoreError::UniqueViolation("event_equipment_pkey".into()));
        }
        self.working.lines.insert(key, line.clone());
        Ok(())
    }

    async fn find_line(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> Result<Option<EquipmentReservation>, StoreError> {
        Ok(self.working.lines.get(&(event_id, equipment_id)).cloned())
    }

    async fn list_lines(
        &mut self,
        event_id: Uuid,
    ) -> Result<Vec<EquipmentReservation>, StoreError> {
        let mut lines: Vec<EquipmentReservation> = self
            .working
            .lines
            .values()
            .filter(|line| line.event_id == event_id)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.equipment_id);
        Ok(lines)
    }

    async fn update_line_quantity(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
        quantity: i32,
    ) -> Result<Option<EquipmentReservation>, StoreError> {
        self.fail_at(FailurePoint::UpdateLine)?;
        let Some(line) = self.working.lines.get_mut(&(event_id, equipment_id)) else {
            return Ok(None);
        };
        line.quantity_reserved = quantity;
        line.updated_at = Utc::now();
        Ok(Some(line.clone()))
    }

    async fn delete_line(
        &mut self,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.working.lines.remove(&(event_id, equipment_id)).is_some())
    }

    async fn delete_lines_for_event(&mut self, event_id: Uuid) -> Result<u64, StoreError> {
        let before = self.working.lines.len();
        self.working.lines.retain(|(event, _), _| *event != event_id);
        Ok((before - self.working.lines.len()) as u64)
    }

    async fn find_active_registration(
        &mut self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .working
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.user_id == user_id && r.status.is_active())
            .cloned())
    }

    async fn ticket_exists(&mut self, ticket_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .working
            .registrations
            .values()
            .any(|r| r.ticket_number == ticket_number))
    }

    async fn insert_registration(
        &mut self,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        self.fail_at(FailurePoint::InsertRegistration)?;
        // Mirrors registrations_ticket_number_format
        if !shared::validation::is_ticket_number(&registration.ticket_number) {
            return Err(StoreError::Integrity(format!(
                "malformed ticket number {:?}",
                registration.ticket_number
            )));
        }
        for existing in self.working.registrations.values() {
            if existing.ticket_number == registration.ticket_number {
                return Err(StoreError::UniqueViolation(TICKET_NUMBER_CONSTRAINT.into()));
            }
            if existing.event_id == registration.event_id
                && existing.user_id == registration.user_id
                && existing.status.is_active()
                && registration.status.is_active()
            {
                return Err(StoreError::UniqueViolation(
                    ACTIVE_REGISTRATION_CONSTRAINT.into(),
                ));
            }
        }
        self.working
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn find_registration(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        Ok(self.working.registrations.get(&id).cloned())
    }

    async fn lock_registration(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        Ok(self.working.registrations.get(&id).cloned())
    }

    async fn set_registration_status(
        &mut self,
        id: Uuid,
        status: RegistrationStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Registration>, StoreError> {
        self.fail_at(FailurePoint::SetRegistrationStatus)?;
        let Some(registration) = self.working.registrations.get_mut(&id) else {
            return Ok(None);
        };
        registration.status = status;
        registration.cancelled_at = cancelled_at;
        registration.updated_at = Utc::now();
        Ok(Some(registration.clone()))
    }

    async fn find_waitlisted_registration(
        &mut self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .working
            .registrations
            .values()
            .find(|r| {
                r.event_id == event_id
                    && r.user_id == user_id
                    && r.status == RegistrationStatus::Waitlisted
            })
            .cloned())
    }

    async fn list_active_registrations(
        &mut self,
        event_id: Uuid,
    ) -> Result<Vec<Registration>, StoreError> {
        let mut registrations: Vec<Registration> = self
            .working
            .registrations
            .values()
            .filter(|r| r.event_id == event_id && r.status.is_active())
            .cloned()
            .collect();
        registrations.sort_by_key(|r| r.created_at);
        Ok(registrations)
    }

    async fn delete_registrations_for_event(&mut self, event_id: Uuid) -> Result<u64, StoreError> {
        let before = self.working.registrations.len();
        self.working
            .registrations
            .retain(|_, r| r.event_id != event_id);
        Ok((before - self.working.registrations.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        check_failure(&self.failures, FailurePoint::Commit)?;
        let InMemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
