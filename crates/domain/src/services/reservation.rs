//! Reservation coordinator.
//!
//! Each public operation runs in exactly one store transaction. Stock changes go
//! through [`InventoryLedger`] and capacity changes through [`CapacityTracker`];
//! if any step fails the transaction is rolled back, which undoes every step
//! already applied. Notifications are sent only after a successful commit.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use uuid::Uuid;

use crate::errors::{ReservationError, ReservationResult, StoreError};
use crate::models::event::{in_lock_order, validate_lines, validate_spec};
use crate::models::{
    CapacityDecision, EquipmentLine, EquipmentReservation, Event, EventCapacity, EventDetails,
    EventSpec, Registration, RegistrationOutcome, RegistrationStatus,
};
use crate::services::capacity_tracker::CapacityTracker;
use crate::services::inventory_ledger::InventoryLedger;
use crate::services::notification::{
    dispatch_detached, Notice, NotificationDispatcher, NotificationKind, NotificationPayload,
};
use crate::services::store::{
    ReservationStore, ReservationTx, ACTIVE_REGISTRATION_CONSTRAINT, TICKET_NUMBER_CONSTRAINT,
};
use crate::services::ticket::{
    TicketNumberGenerator, TimestampTicketGenerator, DEFAULT_TICKET_MAX_ATTEMPTS,
};
use crate::services::ticket_renderer::{PlainTextTicketRenderer, RenderedDocument, TicketRenderer};

/// Tunables for the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Ticket number candidates tried per registration.
    pub ticket_max_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ticket_max_attempts: DEFAULT_TICKET_MAX_ATTEMPTS,
        }
    }
}

/// Commits on success, rolls back on failure.
async fn finish<T>(
    tx: Box<dyn ReservationTx>,
    result: ReservationResult<T>,
) -> ReservationResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

/// A missing equipment row behind an existing reservation line is corruption,
/// not a caller error.
fn line_equipment_missing(err: ReservationError) -> ReservationError {
    match err {
        ReservationError::NotFound(what) => {
            ReservationError::DataIntegrity(format!("reservation line references missing {}", what))
        }
        other => other,
    }
}

fn event_not_found(event_id: Uuid) -> ReservationError {
    ReservationError::NotFound(format!("Event {}", event_id))
}

fn check_quantity(quantity: i32) -> ReservationResult<()> {
    shared::validation::validate_units(quantity).map_err(|e| {
        ReservationError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Quantity must be positive".to_string()),
        )
    })
}

/// Transaction boundary for every multi-record reservation operation.
#[derive(Clone)]
pub struct ReservationCoordinator {
    store: Arc<dyn ReservationStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    tickets: Arc<dyn TicketNumberGenerator>,
    renderer: Arc<dyn TicketRenderer>,
    config: CoordinatorConfig,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn ReservationStore>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            store,
            notifier,
            tickets: Arc::new(TimestampTicketGenerator),
            renderer: Arc::new(PlainTextTicketRenderer),
            config: CoordinatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ticket_generator(mut self, tickets: Arc<dyn TicketNumberGenerator>) -> Self {
        self.tickets = tickets;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TicketRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    fn notify(&self, notices: Vec<Notice>) {
        dispatch_detached(self.notifier.clone(), notices);
    }

    // ===========================================
    // Events and equipment lines
    // ===========================================

    /// Creates an event and reserves all of its equipment, or nothing.
    pub async fn create_event_with_equipment(
        &self,
        created_by: Uuid,
        spec: EventSpec,
        lines: Vec<EquipmentLine>,
    ) -> ReservationResult<EventDetails> {
        validate_spec(&spec)?;
        validate_lines(&lines)?;

        let now = Utc::now();
        let event_id = Uuid::new_v4();
        let event = Event {
            id: event_id,
            name: spec.name.trim().to_string(),
            description: spec.description,
            location: spec.location.trim().to_string(),
            starts_at: spec.starts_at,
            created_by,
            capacity: EventCapacity::new(
                event_id,
                spec.capacity,
                spec.waitlist_enabled,
                spec.waitlist_limit,
            ),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        let result = Self::create_event_in(tx.as_mut(), &event, &lines).await;
        let reservations = finish(tx, result).await?;

        tracing::info!(
            event_id = %event.id,
            created_by = %created_by,
            lines = reservations.len(),
            capacity = event.capacity.capacity,
            "Event created with equipment"
        );

        self.notify(vec![Notice::new(
            created_by,
            NotificationKind::EventCreated,
            NotificationPayload::for_event(
                event.id,
                "Event created",
                format!("Your event \"{}\" has been created", event.name),
            ),
        )]);

        Ok(EventDetails::new(event, reservations))
    }

    async fn create_event_in(
        tx: &mut dyn ReservationTx,
        event: &Event,
        lines: &[EquipmentLine],
    ) -> ReservationResult<Vec<EquipmentReservation>> {
        tx.insert_event(event).await?;

        let mut reservations = Vec::with_capacity(lines.len());
        for line in in_lock_order(lines) {
            let stock = InventoryLedger::reserve_in(tx, line.equipment_id, line.quantity).await?;
            let reservation =
                EquipmentReservation::new(event.id, line.equipment_id, line.quantity, stock.unit_price);
            tx.insert_line(&reservation).await?;
            reservations.push(reservation);
        }
        Ok(reservations)
    }

    /// Adds new equipment lines to an existing event, all or nothing.
    pub async fn add_equipment_to_event(
        &self,
        event_id: Uuid,
        lines: Vec<EquipmentLine>,
    ) -> ReservationResult<EventDetails> {
        validate_lines(&lines)?;

        let mut tx = self.store.begin().await?;
        let result = Self::add_equipment_in(tx.as_mut(), event_id, &lines).await;
        let details = finish(tx, result).await?;

        tracing::info!(event_id = %event_id, added = lines.len(), "Equipment added to event");
        self.notify(vec![Self::equipment_changed_notice(&details.event)]);
        Ok(details)
    }

    async fn add_equipment_in(
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
        lines: &[EquipmentLine],
    ) -> ReservationResult<EventDetails> {
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;

        for line in in_lock_order(lines) {
            if tx.find_line(event_id, line.equipment_id).await?.is_some() {
                return Err(ReservationError::Validation(format!(
                    "Equipment {} is already reserved for this event; update its quantity instead",
                    line.equipment_id
                )));
            }
            let stock = InventoryLedger::reserve_in(tx, line.equipment_id, line.quantity).await?;
            tx.insert_line(&EquipmentReservation::new(
                event_id,
                line.equipment_id,
                line.quantity,
                stock.unit_price,
            ))
            .await?;
        }

        let all = tx.list_lines(event_id).await?;
        Ok(EventDetails::new(event, all))
    }

    /// Releases a whole line and removes it from the event.
    pub async fn remove_equipment_from_event(
        &self,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> ReservationResult<EventDetails> {
        let mut tx = self.store.begin().await?;
        let result = Self::remove_equipment_in(tx.as_mut(), event_id, equipment_id).await;
        let details = finish(tx, result).await?;

        tracing::info!(
            event_id = %event_id,
            equipment_id = %equipment_id,
            "Equipment removed from event"
        );
        self.notify(vec![Self::equipment_changed_notice(&details.event)]);
        Ok(details)
    }

    async fn remove_equipment_in(
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> ReservationResult<EventDetails> {
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        let line = tx.find_line(event_id, equipment_id).await?.ok_or_else(|| {
            ReservationError::NotFound(format!(
                "Equipment {} on event {}",
                equipment_id, event_id
            ))
        })?;

        InventoryLedger::release_in(tx, equipment_id, line.quantity_reserved)
            .await
            .map_err(line_equipment_missing)?;
        tx.delete_line(event_id, equipment_id).await?;

        let remaining = tx.list_lines(event_id).await?;
        Ok(EventDetails::new(event, remaining))
    }

    /// Changes the reserved quantity of one line.
    ///
    /// The line is only rewritten after the ledger accepted the difference.
    pub async fn update_equipment_quantity(
        &self,
        event_id: Uuid,
        equipment_id: Uuid,
        new_quantity: i32,
    ) -> ReservationResult<EquipmentReservation> {
        check_quantity(new_quantity)?;

        let mut tx = self.store.begin().await?;
        let result =
            Self::update_quantity_in(tx.as_mut(), event_id, equipment_id, new_quantity).await;
        let (event, line, delta) = finish(tx, result).await?;

        if delta != 0 {
            tracing::info!(
                event_id = %event_id,
                equipment_id = %equipment_id,
                delta = delta,
                quantity = line.quantity_reserved,
                "Event equipment quantity updated"
            );
            self.notify(vec![Self::equipment_changed_notice(&event)]);
        }
        Ok(line)
    }

    async fn update_quantity_in(
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
        equipment_id: Uuid,
        new_quantity: i32,
    ) -> ReservationResult<(Event, EquipmentReservation, i32)> {
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        let line = tx.find_line(event_id, equipment_id).await?.ok_or_else(|| {
            ReservationError::NotFound(format!(
                "Equipment {} on event {}",
                equipment_id, event_id
            ))
        })?;

        let delta = new_quantity - line.quantity_reserved;
        if delta == 0 {
            return Ok((event, line, 0));
        }

        InventoryLedger::adjust_in(tx, equipment_id, -delta)
            .await
            .map_err(line_equipment_missing)?;
        let updated = tx
            .update_line_quantity(event_id, equipment_id, new_quantity)
            .await?
            .ok_or_else(|| {
                ReservationError::DataIntegrity(format!(
                    "reservation line for equipment {} vanished",
                    equipment_id
                ))
            })?;
        Ok((event, updated, delta))
    }

    /// Deletes an event, releasing its stock and dropping its registrations.
    pub async fn delete_event(&self, event_id: Uuid) -> ReservationResult<()> {
        let mut tx = self.store.begin().await?;
        let result = Self::delete_event_in(tx.as_mut(), event_id).await;
        let (event, registrants, released_lines) = finish(tx, result).await?;

        tracing::info!(
            event_id = %event_id,
            released_lines = released_lines,
            registrations = registrants.len(),
            "Event deleted"
        );

        self.notify(
            registrants
                .iter()
                .map(|r| {
                    Notice::new(
                        r.user_id,
                        NotificationKind::EventCancelled,
                        NotificationPayload::for_event(
                            event.id,
                            "Event cancelled",
                            format!("The event \"{}\" has been cancelled", event.name),
                        )
                        .with_registration(r.id),
                    )
                })
                .collect(),
        );
        Ok(())
    }

    async fn delete_event_in(
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
    ) -> ReservationResult<(Event, Vec<Registration>, usize)> {
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;

        let mut lines = tx.list_lines(event_id).await?;
        lines.sort_by_key(|line| line.equipment_id);
        for line in &lines {
            InventoryLedger::release_in(tx, line.equipment_id, line.quantity_reserved)
                .await
                .map_err(line_equipment_missing)?;
        }

        let registrants = tx.list_active_registrations(event_id).await?;
        tx.delete_registrations_for_event(event_id).await?;
        tx.delete_lines_for_event(event_id).await?;
        if !tx.delete_event(event_id).await? {
            return Err(ReservationError::DataIntegrity(format!(
                "event {} vanished during delete",
                event_id
            )));
        }
        Ok((event, registrants, lines.len()))
    }

    fn equipment_changed_notice(event: &Event) -> Notice {
        Notice::new(
            event.created_by,
            NotificationKind::EventEquipmentChanged,
            NotificationPayload::for_event(
                event.id,
                "Event equipment updated",
                format!("Equipment for \"{}\" has been updated", event.name),
            ),
        )
    }

    // ===========================================
    // Registrations
    // ===========================================

    /// Registers `user_id` for an event as confirmed or waitlisted.
    pub async fn register_for_event(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> ReservationResult<RegistrationOutcome> {
        let mut tx = self.store.begin().await?;
        let result = self.register_in(tx.as_mut(), event_id, user_id).await;
        let result = finish(tx, result).await;

        let (registration, event) = match result {
            Ok(value) => value,
            Err(err) => {
                if matches!(err, ReservationError::EventFull(_)) {
                    counter!("registrations_total", "status" => "rejected").increment(1);
                }
                return Err(err);
            }
        };

        counter!("registrations_total", "status" => registration.status.to_string())
            .increment(1);
        tracing::info!(
            event_id = %event_id,
            user_id = %user_id,
            registration_id = %registration.id,
            ticket_number = %registration.ticket_number,
            status = %registration.status,
            "Registration created"
        );

        let (kind, title, message) = match registration.status {
            RegistrationStatus::Confirmed => (
                NotificationKind::RegistrationConfirmed,
                "Registration confirmed",
                format!(
                    "You are registered for \"{}\". Ticket {}",
                    event.name, registration.ticket_number
                ),
            ),
            _ => (
                NotificationKind::RegistrationWaitlisted,
                "Added to waitlist",
                format!(
                    "\"{}\" is full. You are on the waitlist with ticket {}",
                    event.name, registration.ticket_number
                ),
            ),
        };
        self.notify(vec![Notice::new(
            user_id,
            kind,
            NotificationPayload::for_event(event_id, title, message)
                .with_registration(registration.id),
        )]);

        Ok(match registration.status {
            RegistrationStatus::Confirmed => RegistrationOutcome::Confirmed(registration),
            _ => RegistrationOutcome::Waitlisted(registration),
        })
    }

    async fn register_in(
        &self,
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
        user_id: Uuid,
    ) -> ReservationResult<(Registration, Event)> {
        // Locking the event first serializes registrations per event, which makes
        // the duplicate check below race-free.
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;

        if tx.find_active_registration(event_id, user_id).await?.is_some() {
            return Err(ReservationError::AlreadyRegistered { event_id, user_id });
        }

        let status = match CapacityTracker::try_confirm_in(tx, event_id, user_id).await? {
            CapacityDecision::Confirmed => RegistrationStatus::Confirmed,
            CapacityDecision::Waitlisted { .. } => RegistrationStatus::Waitlisted,
            CapacityDecision::Rejected => return Err(ReservationError::EventFull(event_id)),
        };

        let now = Utc::now();
        let mut registration = Registration {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            ticket_number: String::new(),
            status,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };

        let max_attempts = self.config.ticket_max_attempts;
        let mut attempts = 0;
        loop {
            if attempts >= max_attempts {
                tracing::error!(
                    event_id = %event_id,
                    attempts = attempts,
                    "Ticket number space exhausted for this attempt budget"
                );
                return Err(ReservationError::TicketCollision { attempts });
            }
            attempts += 1;

            let candidate = self.tickets.generate();
            if tx.ticket_exists(&candidate).await? {
                tracing::debug!(ticket_number = %candidate, attempt = attempts, "Ticket collision");
                continue;
            }

            registration.ticket_number = candidate;
            match tx.insert_registration(&registration).await {
                Ok(()) => break,
                Err(StoreError::UniqueViolation(constraint))
                    if constraint == TICKET_NUMBER_CONSTRAINT =>
                {
                    tracing::debug!(attempt = attempts, "Ticket collision on insert");
                    continue;
                }
                Err(StoreError::UniqueViolation(constraint))
                    if constraint == ACTIVE_REGISTRATION_CONSTRAINT =>
                {
                    return Err(ReservationError::AlreadyRegistered { event_id, user_id });
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok((registration, event))
    }

    /// Cancels a registration and promotes the waitlist head if a slot freed up.
    pub async fn cancel_registration(
        &self,
        registration_id: Uuid,
    ) -> ReservationResult<Registration> {
        let mut tx = self.store.begin().await?;
        let result = Self::cancel_in(tx.as_mut(), registration_id).await;
        let (cancelled, promoted, event) = finish(tx, result).await?;

        counter!("registrations_total", "status" => "cancelled").increment(1);
        tracing::info!(
            registration_id = %registration_id,
            event_id = %cancelled.event_id,
            promoted_registration_id = ?promoted.as_ref().map(|r| r.id),
            "Registration cancelled"
        );

        if let Some(promoted) = promoted {
            self.notify(vec![Notice::new(
                promoted.user_id,
                NotificationKind::WaitlistPromoted,
                NotificationPayload::for_event(
                    event.id,
                    "You're in!",
                    format!(
                        "A spot opened up for \"{}\". Your ticket {} is now confirmed",
                        event.name, promoted.ticket_number
                    ),
                )
                .with_registration(promoted.id),
            )]);
        }

        Ok(cancelled)
    }

    async fn cancel_in(
        tx: &mut dyn ReservationTx,
        registration_id: Uuid,
    ) -> ReservationResult<(Registration, Option<Registration>, Event)> {
        let found = tx
            .find_registration(registration_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Registration {}", registration_id)))?;

        // Event before registration, the same order registration takes.
        let event = tx.lock_event(found.event_id).await?.ok_or_else(|| {
            ReservationError::DataIntegrity(format!(
                "registration {} references missing event {}",
                registration_id, found.event_id
            ))
        })?;
        let current = tx
            .lock_registration(registration_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Registration {}", registration_id)))?;

        let was_confirmed = match current.status {
            RegistrationStatus::Cancelled => {
                return Err(ReservationError::AlreadyCancelled(registration_id))
            }
            RegistrationStatus::Confirmed => true,
            RegistrationStatus::Waitlisted => false,
            RegistrationStatus::Pending => {
                return Err(ReservationError::DataIntegrity(format!(
                    "registration {} is stored as pending",
                    registration_id
                )))
            }
        };

        let cancelled = tx
            .set_registration_status(registration_id, RegistrationStatus::Cancelled, Some(Utc::now()))
            .await?
            .ok_or_else(|| {
                ReservationError::DataIntegrity(format!("registration {} vanished", registration_id))
            })?;

        let promoted_user =
            CapacityTracker::cancel_in(tx, current.event_id, current.user_id, was_confirmed).await?;

        let promoted = match promoted_user {
            Some(user_id) => {
                let waiting = tx
                    .find_waitlisted_registration(current.event_id, user_id)
                    .await?
                    .ok_or_else(|| {
                        ReservationError::DataIntegrity(format!(
                            "waitlisted user {} on event {} has no waitlisted registration",
                            user_id, current.event_id
                        ))
                    })?;
                let confirmed = tx
                    .set_registration_status(waiting.id, RegistrationStatus::Confirmed, None)
                    .await?
                    .ok_or_else(|| {
                        ReservationError::DataIntegrity(format!("registration {} vanished", waiting.id))
                    })?;
                Some(confirmed)
            }
            None => None,
        };

        Ok((cancelled, promoted, event))
    }

    // ===========================================
    // Reads
    // ===========================================

    pub async fn get_event(&self, event_id: Uuid) -> ReservationResult<EventDetails> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let event = tx
                .find_event(event_id)
                .await?
                .ok_or_else(|| event_not_found(event_id))?;
            let lines = tx.list_lines(event_id).await?;
            Ok::<_, ReservationError>(EventDetails::new(event, lines))
        }
        .await;
        finish(tx, result).await
    }

    pub async fn get_registration(&self, registration_id: Uuid) -> ReservationResult<Registration> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .find_registration(registration_id)
            .await
            .map_err(ReservationError::from)
            .and_then(|found| {
                found.ok_or_else(|| {
                    ReservationError::NotFound(format!("Registration {}", registration_id))
                })
            });
        finish(tx, result).await
    }

    /// Renders the ticket of a live registration.
    pub async fn render_ticket(&self, registration_id: Uuid) -> ReservationResult<RenderedDocument> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let registration = tx
                .find_registration(registration_id)
                .await?
                .ok_or_else(|| {
                    ReservationError::NotFound(format!("Registration {}", registration_id))
                })?;
            let event = tx.find_event(registration.event_id).await?.ok_or_else(|| {
                ReservationError::DataIntegrity(format!(
                    "registration {} references missing event {}",
                    registration_id, registration.event_id
                ))
            })?;
            Ok::<_, ReservationError>((registration, event))
        }
        .await;
        let (registration, event) = finish(tx, result).await?;

        if registration.status == RegistrationStatus::Cancelled {
            return Err(ReservationError::AlreadyCancelled(registration_id));
        }

        self.renderer
            .render(&registration, &event)
            .map_err(|reason| {
                tracing::error!(
                    registration_id = %registration_id,
                    error = %reason,
                    "Ticket rendering failed"
                );
                ReservationError::Rendering(reason)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EquipmentStatus, EquipmentStock};
    use crate::services::memory_store::{FailurePoint, InMemoryReservationStore};
    use crate::services::notification::MockNotificationDispatcher;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Harness {
        store: InMemoryReservationStore,
        notifier: MockNotificationDispatcher,
        coordinator: ReservationCoordinator,
    }

    fn harness() -> Harness {
        let store = InMemoryReservationStore::new();
        let notifier = MockNotificationDispatcher::new();
        let coordinator =
            ReservationCoordinator::new(Arc::new(store.clone()), Arc::new(notifier.clone()));
        Harness {
            store,
            notifier,
            coordinator,
        }
    }

    impl Harness {
        async fn equipment(&self, quantity: i32, cents: i64) -> Uuid {
            let stock = EquipmentStock {
                id: Uuid::new_v4(),
                vendor_id: Uuid::new_v4(),
                name: "Speaker".into(),
                description: String::new(),
                quantity,
                reserved_count: 0,
                unit_price: Decimal::new(cents, 2),
                status: EquipmentStatus::Approved,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let id = stock.id;
            self.store.put_equipment(stock).await;
            id
        }

        async fn stock(&self, id: Uuid) -> (i32, i32) {
            let state = self.store.snapshot().await;
            let stock = &state.equipment[&id];
            (stock.quantity, stock.reserved_count)
        }

        async fn event(&self, capacity: i32, lines: Vec<EquipmentLine>) -> EventDetails {
            self.coordinator
                .create_event_with_equipment(Uuid::new_v4(), spec(capacity), lines)
                .await
                .unwrap()
        }
    }

    fn spec(capacity: i32) -> EventSpec {
        EventSpec {
            name: "Open Air".into(),
            description: "Outdoor concert".into(),
            location: "City Park".into(),
            starts_at: Utc::now() + chrono::Duration::days(30),
            capacity,
            waitlist_enabled: true,
            waitlist_limit: None,
        }
    }

    fn line(equipment_id: Uuid, quantity: i32) -> EquipmentLine {
        EquipmentLine {
            equipment_id,
            quantity,
        }
    }

    /// Always returns the same ticket number.
    struct FixedTickets(&'static str);

    impl TicketNumberGenerator for FixedTickets {
        fn generate(&self) -> String {
            self.0.to_string()
        }
    }

    /// Replays a script of ticket numbers, counting calls.
    struct ScriptedTickets {
        script: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl TicketNumberGenerator for ScriptedTickets {
        fn generate(&self) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn test_create_event_reserves_and_snapshots_price() {
        let h = harness();
        let speakers = h.equipment(10, 2500).await;
        let lights = h.equipment(4, 1000).await;

        let details = h.event(50, vec![line(speakers, 3), line(lights, 4)]).await;

        assert_eq!(details.equipment.len(), 2);
        assert_eq!(details.equipment_cost, Decimal::new(11500, 2));
        assert_eq!(h.stock(speakers).await, (7, 3));
        assert_eq!(h.stock(lights).await, (0, 4));
        assert_eq!(details.event.capacity.confirmed_count, 0);

        assert!(h.notifier.wait_for(1, Duration::from_secs(2)).await);
        let sent = h.notifier.sent_of(NotificationKind::EventCreated);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, details.event.created_by);
    }

    #[tokio::test]
    async fn test_create_event_is_atomic_when_a_line_is_short() {
        let h = harness();
        let e1 = h.equipment(2, 100).await;
        let e2 = h.equipment(10, 100).await;

        let err = h
            .coordinator
            .create_event_with_equipment(
                Uuid::new_v4(),
                spec(10),
                vec![line(e2, 5), line(e1, 3)],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReservationError::InsufficientStock { equipment_id, .. } if equipment_id == e1
        ));
        assert_eq!(h.stock(e1).await, (2, 0));
        assert_eq!(h.stock(e2).await, (10, 0));
        let state = h.store.snapshot().await;
        assert!(state.events.is_empty());
        assert!(state.lines.is_empty());
    }

    #[tokio::test]
    async fn test_lines_are_reserved_in_equipment_id_order() {
        let h = harness();
        let a = h.equipment(100, 100).await;
        let b = h.equipment(100, 100).await;
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        let details = h.event(10, vec![line(high, 1), line(low, 2)]).await;
        let created: Vec<Uuid> = details.equipment.iter().map(|l| l.equipment_id).collect();
        assert_eq!(created, vec![low, high]);

        let fetched = h.coordinator.get_event(details.event.id).await.unwrap();
        let listed: Vec<Uuid> = fetched.equipment.iter().map(|l| l.equipment_id).collect();
        assert_eq!(listed, vec![low, high]);
    }

    #[tokio::test]
    async fn test_opposite_line_orders_conserve_stock() {
        let h = harness();
        let e1 = h.equipment(1000, 100).await;
        let e2 = h.equipment(1000, 100).await;
        let coordinator = Arc::new(h.coordinator.clone());

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let coordinator = coordinator.clone();
                let lines = if i % 2 == 0 {
                    vec![line(e1, 1), line(e2, 1)]
                } else {
                    vec![line(e2, 1), line(e1, 1)]
                };
                tokio::spawn(async move {
                    let details = coordinator
                        .create_event_with_equipment(Uuid::new_v4(), spec(5), lines)
                        .await?;
                    if i % 4 == 0 {
                        coordinator.delete_event(details.event.id).await?;
                    }
                    Ok::<_, ReservationError>(())
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 100 events, 25 deleted again
        assert_eq!(h.stock(e1).await, (925, 75));
        assert_eq!(h.stock(e2).await, (925, 75));
    }

    #[tokio::test]
    async fn test_create_event_validates_before_touching_stock() {
        let h = harness();
        let e1 = h.equipment(5, 100).await;

        let bad = spec(0);
        assert!(matches!(
            h.coordinator
                .create_event_with_equipment(Uuid::new_v4(), bad, vec![line(e1, 1)])
                .await,
            Err(ReservationError::Validation(_))
        ));
        assert!(matches!(
            h.coordinator
                .create_event_with_equipment(Uuid::new_v4(), spec(5), vec![])
                .await,
            Err(ReservationError::Validation(_))
        ));
        assert!(matches!(
            h.coordinator
                .create_event_with_equipment(
                    Uuid::new_v4(),
                    spec(5),
                    vec![line(e1, 1), line(e1, 2)]
                )
                .await,
            Err(ReservationError::Validation(_))
        ));
        assert_eq!(h.stock(e1).await, (5, 0));
    }

    #[tokio::test]
    async fn test_create_event_rolls_back_on_store_failure() {
        let h = harness();
        let e1 = h.equipment(5, 100).await;
        let e2 = h.equipment(5, 100).await;
        h.store.inject_failure(FailurePoint::InsertLine, 1);

        let err = h
            .coordinator
            .create_event_with_equipment(Uuid::new_v4(), spec(5), vec![line(e1, 2), line(e2, 2)])
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Persistence(_)));
        assert_eq!(h.stock(e1).await, (5, 0));
        assert_eq!(h.stock(e2).await, (5, 0));
        assert!(h.store.snapshot().await.events.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_two_end_to_end() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(2, vec![line(gear, 1)]).await.event;
        let (u1, u2, u3, u4) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let r1 = h.coordinator.register_for_event(event.id, u1).await.unwrap();
        let r2 = h.coordinator.register_for_event(event.id, u2).await.unwrap();
        let r3 = h.coordinator.register_for_event(event.id, u3).await.unwrap();
        let r4 = h.coordinator.register_for_event(event.id, u4).await.unwrap();

        assert!(matches!(r1, RegistrationOutcome::Confirmed(_)));
        assert!(matches!(r2, RegistrationOutcome::Confirmed(_)));
        assert!(matches!(r3, RegistrationOutcome::Waitlisted(_)));
        assert!(matches!(r4, RegistrationOutcome::Waitlisted(_)));

        h.coordinator
            .cancel_registration(r1.registration().id)
            .await
            .unwrap();

        let state = h.store.snapshot().await;
        let capacity = &state.events[&event.id].capacity;
        assert_eq!(capacity.confirmed_count, 2);
        assert_eq!(capacity.waitlist.iter().copied().collect::<Vec<_>>(), vec![u4]);

        let r3_now = h
            .coordinator
            .get_registration(r3.registration().id)
            .await
            .unwrap();
        assert_eq!(r3_now.status, RegistrationStatus::Confirmed);
        let r1_now = h
            .coordinator
            .get_registration(r1.registration().id)
            .await
            .unwrap();
        assert_eq!(r1_now.status, RegistrationStatus::Cancelled);
        assert!(r1_now.cancelled_at.is_some());

        assert!(h.notifier.wait_for(6, Duration::from_secs(2)).await);
        let promoted = h.notifier.sent_of(NotificationKind::WaitlistPromoted);
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].user_id, u3);
    }

    #[tokio::test]
    async fn test_cancel_waitlisted_does_not_promote() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(1, vec![line(gear, 1)]).await.event;

        h.coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();
        let waiting = h
            .coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();

        h.coordinator
            .cancel_registration(waiting.registration().id)
            .await
            .unwrap();

        let state = h.store.snapshot().await;
        let capacity = &state.events[&event.id].capacity;
        assert_eq!(capacity.confirmed_count, 1);
        assert!(capacity.waitlist.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_twice_is_already_cancelled() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(3, vec![line(gear, 1)]).await.event;
        let reg = h
            .coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();

        h.coordinator
            .cancel_registration(reg.registration().id)
            .await
            .unwrap();
        assert!(matches!(
            h.coordinator.cancel_registration(reg.registration().id).await,
            Err(ReservationError::AlreadyCancelled(_))
        ));
        let state = h.store.snapshot().await;
        assert_eq!(state.events[&event.id].capacity.confirmed_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_rolls_back_when_promotion_fails() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(1, vec![line(gear, 1)]).await.event;
        let first = h
            .coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();
        h.coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();

        // First status write (the cancellation) succeeds, the promotion fails.
        h.store
            .inject_failure(FailurePoint::SetRegistrationStatus, 1);
        assert!(matches!(
            h.coordinator
                .cancel_registration(first.registration().id)
                .await,
            Err(ReservationError::Persistence(_))
        ));

        let state = h.store.snapshot().await;
        assert_eq!(
            state.registrations[&first.registration().id].status,
            RegistrationStatus::Confirmed
        );
        assert_eq!(state.events[&event.id].capacity.waitlist.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(5, vec![line(gear, 1)]).await.event;
        let user = Uuid::new_v4();

        h.coordinator.register_for_event(event.id, user).await.unwrap();
        assert!(matches!(
            h.coordinator.register_for_event(event.id, user).await,
            Err(ReservationError::AlreadyRegistered { .. })
        ));

        // Re-registering after a cancellation is allowed.
        let active = {
            let state = h.store.snapshot().await;
            state
                .registrations
                .values()
                .find(|r| r.user_id == user)
                .unwrap()
                .id
        };
        h.coordinator.cancel_registration(active).await.unwrap();
        assert!(h.coordinator.register_for_event(event.id, user).await.is_ok());
    }

    #[tokio::test]
    async fn test_event_full_without_waitlist() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let mut no_waitlist = spec(1);
        no_waitlist.waitlist_enabled = false;
        let event = h
            .coordinator
            .create_event_with_equipment(Uuid::new_v4(), no_waitlist, vec![line(gear, 1)])
            .await
            .unwrap()
            .event;

        h.coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();
        assert!(matches!(
            h.coordinator.register_for_event(event.id, Uuid::new_v4()).await,
            Err(ReservationError::EventFull(id)) if id == event.id
        ));
        let state = h.store.snapshot().await;
        assert_eq!(state.registrations.len(), 1);
    }

    #[tokio::test]
    async fn test_register_unknown_event() {
        let h = harness();
        assert!(matches!(
            h.coordinator
                .register_for_event(Uuid::new_v4(), Uuid::new_v4())
                .await,
            Err(ReservationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_thousand_concurrent_registrations_get_distinct_tickets() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(600, vec![line(gear, 1)]).await.event;

        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let coordinator = h.coordinator.clone();
                tokio::spawn(async move {
                    coordinator
                        .register_for_event(event.id, Uuid::new_v4())
                        .await
                })
            })
            .collect();

        let mut tickets = HashSet::new();
        let mut confirmed = 0;
        let mut waitlisted = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(shared::validation::is_ticket_number(
                &outcome.registration().ticket_number
            ));
            tickets.insert(outcome.registration().ticket_number.clone());
            match outcome {
                RegistrationOutcome::Confirmed(_) => confirmed += 1,
                RegistrationOutcome::Waitlisted(_) => waitlisted += 1,
            }
        }

        assert_eq!(tickets.len(), 1000);
        assert_eq!(confirmed, 600);
        assert_eq!(waitlisted, 400);
        let state = h.store.snapshot().await;
        assert_eq!(state.events[&event.id].capacity.confirmed_count, 600);
        assert_eq!(state.events[&event.id].capacity.waitlist.len(), 400);
    }

    #[tokio::test]
    async fn test_ticket_collision_exhausts_attempts_and_rolls_back() {
        let h = harness();
        let coordinator = h
            .coordinator
            .clone()
            .with_ticket_generator(Arc::new(FixedTickets("TKT-000001-0001")))
            .with_config(CoordinatorConfig {
                ticket_max_attempts: 3,
            });
        let gear = h.equipment(1, 100).await;
        let event = h.event(10, vec![line(gear, 1)]).await.event;

        coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();
        assert!(matches!(
            coordinator.register_for_event(event.id, Uuid::new_v4()).await,
            Err(ReservationError::TicketCollision { attempts: 3 })
        ));

        let state = h.store.snapshot().await;
        assert_eq!(state.events[&event.id].capacity.confirmed_count, 1);
        assert_eq!(state.registrations.len(), 1);
    }

    #[tokio::test]
    async fn test_ticket_collision_retries_with_fresh_candidate() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(10, vec![line(gear, 1)]).await.event;

        let tickets = Arc::new(ScriptedTickets {
            script: Mutex::new(vec![
                "TKT-111111-1111".into(),
                "TKT-111111-1111".into(),
                "TKT-222222-2222".into(),
            ]),
            calls: AtomicUsize::new(0),
        });
        let coordinator = h.coordinator.clone().with_ticket_generator(tickets.clone());

        coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();
        let second = coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(second.registration().ticket_number, "TKT-222222-2222");
        assert_eq!(tickets.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_update_equipment_quantity_up_and_down() {
        let h = harness();
        let gear = h.equipment(10, 500).await;
        let event = h.event(10, vec![line(gear, 4)]).await.event;

        let line_after = h
            .coordinator
            .update_equipment_quantity(event.id, gear, 7)
            .await
            .unwrap();
        assert_eq!(line_after.quantity_reserved, 7);
        assert_eq!(h.stock(gear).await, (3, 7));

        let line_after = h
            .coordinator
            .update_equipment_quantity(event.id, gear, 2)
            .await
            .unwrap();
        assert_eq!(line_after.quantity_reserved, 2);
        assert_eq!(h.stock(gear).await, (8, 2));

        assert!(matches!(
            h.coordinator
                .update_equipment_quantity(event.id, gear, 11)
                .await,
            Err(ReservationError::InsufficientStock { .. })
        ));
        assert_eq!(h.stock(gear).await, (8, 2));
        let state = h.store.snapshot().await;
        assert_eq!(state.lines[&(event.id, gear)].quantity_reserved, 2);

        assert!(matches!(
            h.coordinator.update_equipment_quantity(event.id, gear, 0).await,
            Err(ReservationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_quantity_line_failure_restores_stock() {
        let h = harness();
        let gear = h.equipment(10, 500).await;
        let event = h.event(10, vec![line(gear, 4)]).await.event;
        h.store.inject_failure(FailurePoint::UpdateLine, 0);

        assert!(h
            .coordinator
            .update_equipment_quantity(event.id, gear, 6)
            .await
            .is_err());
        assert_eq!(h.stock(gear).await, (6, 4));
    }

    #[tokio::test]
    async fn test_add_and_remove_equipment() {
        let h = harness();
        let chairs = h.equipment(100, 200).await;
        let tables = h.equipment(10, 1500).await;
        let event = h.event(10, vec![line(chairs, 40)]).await.event;

        let details = h
            .coordinator
            .add_equipment_to_event(event.id, vec![line(tables, 5)])
            .await
            .unwrap();
        assert_eq!(details.equipment.len(), 2);
        assert_eq!(h.stock(tables).await, (5, 5));

        assert!(matches!(
            h.coordinator
                .add_equipment_to_event(event.id, vec![line(chairs, 1)])
                .await,
            Err(ReservationError::Validation(_))
        ));

        let details = h
            .coordinator
            .remove_equipment_from_event(event.id, chairs)
            .await
            .unwrap();
        assert_eq!(details.equipment.len(), 1);
        assert_eq!(h.stock(chairs).await, (100, 0));

        assert!(matches!(
            h.coordinator
                .remove_equipment_from_event(event.id, chairs)
                .await,
            Err(ReservationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_event_releases_stock_and_notifies_registrants() {
        let h = harness();
        let gear = h.equipment(10, 100).await;
        let other = h.equipment(3, 100).await;
        let event = h.event(1, vec![line(gear, 6), line(other, 3)]).await.event;
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        h.coordinator.register_for_event(event.id, u1).await.unwrap();
        h.coordinator.register_for_event(event.id, u2).await.unwrap();

        h.coordinator.delete_event(event.id).await.unwrap();

        assert_eq!(h.stock(gear).await, (10, 0));
        assert_eq!(h.stock(other).await, (3, 0));
        let state = h.store.snapshot().await;
        assert!(state.events.is_empty());
        assert!(state.lines.is_empty());
        assert!(state.registrations.is_empty());

        assert!(h.notifier.wait_for(5, Duration::from_secs(2)).await);
        let cancelled: HashSet<Uuid> = h
            .notifier
            .sent_of(NotificationKind::EventCancelled)
            .into_iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(cancelled, HashSet::from([u1, u2]));

        assert!(matches!(
            h.coordinator.delete_event(event.id).await,
            Err(ReservationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_event_failure_keeps_everything() {
        let h = harness();
        let gear = h.equipment(10, 100).await;
        let event = h.event(5, vec![line(gear, 6)]).await.event;
        h.store.inject_failure(FailurePoint::DeleteEvent, 0);

        assert!(h.coordinator.delete_event(event.id).await.is_err());
        assert_eq!(h.stock(gear).await, (4, 6));
        assert!(h.store.snapshot().await.events.contains_key(&event.id));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_commit() {
        let store = InMemoryReservationStore::new();
        let notifier = MockNotificationDispatcher::failing();
        let coordinator =
            ReservationCoordinator::new(Arc::new(store.clone()), Arc::new(notifier.clone()));
        let h = Harness {
            store,
            notifier,
            coordinator,
        };
        let gear = h.equipment(2, 100).await;

        let details = h.event(2, vec![line(gear, 2)]).await;
        assert!(h.notifier.wait_for(1, Duration::from_secs(2)).await);
        assert!(h
            .store
            .snapshot()
            .await
            .events
            .contains_key(&details.event.id));
    }

    #[tokio::test]
    async fn test_render_ticket() {
        let h = harness();
        let gear = h.equipment(1, 100).await;
        let event = h.event(5, vec![line(gear, 1)]).await.event;
        let reg = h
            .coordinator
            .register_for_event(event.id, Uuid::new_v4())
            .await
            .unwrap()
            .into_registration();

        let doc = h.coordinator.render_ticket(reg.id).await.unwrap();
        assert!(String::from_utf8(doc.bytes)
            .unwrap()
            .contains(&reg.ticket_number));

        h.coordinator.cancel_registration(reg.id).await.unwrap();
        assert!(matches!(
            h.coordinator.render_ticket(reg.id).await,
            Err(ReservationError::AlreadyCancelled(_))
        ));
    }
}
