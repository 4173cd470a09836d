//! Event and event capacity domain models.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ReservationError, ReservationResult};
use crate::models::reservation::EquipmentReservation;

/// Outcome of asking an event for a confirmed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum CapacityDecision {
    Confirmed,
    /// Appended to the waitlist; `position` is 1-based.
    Waitlisted { position: usize },
    Rejected,
}

/// Registration counters and waitlist for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EventCapacity {
    pub event_id: Uuid,
    pub capacity: i32,
    pub confirmed_count: i32,
    pub waitlist: VecDeque<Uuid>,
    pub waitlist_enabled: bool,
    /// Maximum waitlist length; `None` means unbounded.
    pub waitlist_limit: Option<i32>,
}

impl EventCapacity {
    pub fn new(
        event_id: Uuid,
        capacity: i32,
        waitlist_enabled: bool,
        waitlist_limit: Option<i32>,
    ) -> Self {
        Self {
            event_id,
            capacity,
            confirmed_count: 0,
            waitlist: VecDeque::new(),
            waitlist_enabled,
            waitlist_limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.confirmed_count >= self.capacity
    }

    pub fn available_spots(&self) -> i32 {
        (self.capacity - self.confirmed_count).max(0)
    }

    fn waitlist_has_room(&self) -> bool {
        match self.waitlist_limit {
            Some(limit) => (self.waitlist.len() as i64) < i64::from(limit),
            None => true,
        }
    }

    /// Decides confirmed vs waitlisted vs rejected and applies the decision.
    ///
    /// Must run while the caller holds exclusive access to this record.
    pub fn try_confirm(&mut self, user_id: Uuid) -> CapacityDecision {
        if self.confirmed_count < self.capacity {
            self.confirmed_count += 1;
            CapacityDecision::Confirmed
        } else if self.waitlist_enabled && self.waitlist_has_room() {
            self.waitlist.push_back(user_id);
            CapacityDecision::Waitlisted {
                position: self.waitlist.len(),
            }
        } else {
            CapacityDecision::Rejected
        }
    }

    /// Releases the slot held by `user_id`.
    ///
    /// A confirmed cancellation frees one slot and, if anyone is waiting, hands it
    /// straight to the head of the waitlist, whose id is returned. A waitlisted
    /// cancellation only removes the user from the waitlist.
    pub fn cancel(&mut self, user_id: Uuid, was_confirmed: bool) -> ReservationResult<Option<Uuid>> {
        if !was_confirmed {
            let position = self
                .waitlist
                .iter()
                .position(|id| *id == user_id)
                .ok_or_else(|| {
                    ReservationError::DataIntegrity(format!(
                        "user {} is not on the waitlist of event {}",
                        user_id, self.event_id
                    ))
                })?;
            self.waitlist.remove(position);
            return Ok(None);
        }

        if self.confirmed_count <= 0 {
            return Err(ReservationError::DataIntegrity(format!(
                "event {} has no confirmed registrations to cancel",
                self.event_id
            )));
        }

        self.confirmed_count -= 1;
        match self.waitlist.pop_front() {
            Some(promoted) => {
                self.confirmed_count += 1;
                Ok(Some(promoted))
            }
            None => Ok(None),
        }
    }

    /// Checks the record's structural invariants.
    pub fn check_invariants(&self) -> ReservationResult<()> {
        if self.capacity < 1 {
            return Err(ReservationError::DataIntegrity(format!(
                "event {} has capacity {}",
                self.event_id, self.capacity
            )));
        }
        if self.confirmed_count < 0 || self.confirmed_count > self.capacity {
            return Err(ReservationError::DataIntegrity(format!(
                "event {} has confirmed_count {} outside 0..={}",
                self.event_id, self.confirmed_count, self.capacity
            )));
        }
        if !self.waitlist.is_empty() && (!self.waitlist_enabled || !self.is_full()) {
            return Err(ReservationError::DataIntegrity(format!(
                "event {} has a waitlist while not full or with the waitlist disabled",
                self.event_id
            )));
        }
        Ok(())
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub capacity: EventCapacity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event together with its equipment lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub equipment: Vec<EquipmentReservation>,
    pub equipment_cost: Decimal,
}

impl EventDetails {
    pub fn new(event: Event, equipment: Vec<EquipmentReservation>) -> Self {
        let equipment_cost = equipment.iter().map(EquipmentReservation::line_cost).sum();
        Self {
            event,
            equipment,
            equipment_cost,
        }
    }
}

/// One requested equipment line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct EquipmentLine {
    pub equipment_id: Uuid,
    #[validate(range(min = 1, max = 100000, message = "Quantity must be between 1 and 100000"))]
    pub quantity: i32,
}

/// Descriptive and capacity fields of a new event.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct EventSpec {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    #[serde(default)]
    pub description: String,

    #[validate(length(min = 1, max = 500, message = "Location must be 1-500 characters"))]
    pub location: String,

    pub starts_at: DateTime<Utc>,

    #[validate(range(min = 1, max = 1000000, message = "Capacity must be at least 1"))]
    pub capacity: i32,

    #[serde(default = "default_waitlist_enabled")]
    pub waitlist_enabled: bool,

    #[validate(range(min = 0, message = "Waitlist limit must not be negative"))]
    #[serde(default)]
    pub waitlist_limit: Option<i32>,
}

fn default_waitlist_enabled() -> bool {
    true
}

/// Request body for event creation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateEventRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub event: EventSpec,

    #[validate(nested)]
    pub equipment: Vec<EquipmentLine>,
}

/// Request body for adding lines to an existing event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct AddEquipmentRequest {
    #[validate(nested)]
    pub equipment: Vec<EquipmentLine>,
}

/// Request body for changing the quantity of one line.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateEquipmentQuantityRequest {
    #[validate(range(min = 1, max = 100000, message = "Quantity must be between 1 and 100000"))]
    pub quantity: i32,
}

/// Validates equipment lines before any stock is touched.
pub fn validate_lines(lines: &[EquipmentLine]) -> ReservationResult<()> {
    if lines.is_empty() {
        return Err(ReservationError::Validation(
            "At least one equipment item is required".into(),
        ));
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        shared::validation::validate_units(line.quantity).map_err(|e| {
            ReservationError::Validation(format!(
                "equipment {}: {}",
                line.equipment_id,
                e.message.map(|m| m.to_string()).unwrap_or_default()
            ))
        })?;
        if !seen.insert(line.equipment_id) {
            return Err(ReservationError::Validation(format!(
                "Equipment {} is listed more than once",
                line.equipment_id
            )));
        }
    }
    Ok(())
}

/// Lines sorted by equipment id.
///
/// Every multi-line operation reserves and releases in this order, so two
/// transactions that touch the same equipment rows lock them in the same
/// sequence and cannot deadlock.
pub fn in_lock_order(lines: &[EquipmentLine]) -> Vec<EquipmentLine> {
    let mut ordered = lines.to_vec();
    ordered.sort_by_key(|line| line.equipment_id);
    ordered
}

/// Validates the event fields before any stock is touched.
pub fn validate_spec(spec: &EventSpec) -> ReservationResult<()> {
    spec.validate()?;
    for (field, value) in [("name", &spec.name), ("location", &spec.location)] {
        if shared::validation::validate_not_blank(value).is_err() {
            return Err(ReservationError::Validation(format!(
                "{}: Value must not be blank",
                field
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_lock_order_sorts_by_equipment_id() {
        let (low, high) = {
            let a = Uuid::new_v4();
            let b = Uuid::new_v4();
            if a < b { (a, b) } else { (b, a) }
        };
        let lines = [
            EquipmentLine { equipment_id: high, quantity: 1 },
            EquipmentLine { equipment_id: low, quantity: 2 },
        ];

        let ordered = in_lock_order(&lines);
        assert_eq!(ordered[0], EquipmentLine { equipment_id: low, quantity: 2 });
        assert_eq!(ordered[1], EquipmentLine { equipment_id: high, quantity: 1 });
        // Opposite request orders converge on one lock order
        let reversed = [lines[1], lines[0]];
        assert_eq!(in_lock_order(&reversed), ordered);
    }

    fn capacity(capacity: i32, waitlist_enabled: bool) -> EventCapacity {
        EventCapacity::new(Uuid::new_v4(), capacity, waitlist_enabled, None)
    }

    fn spec() -> EventSpec {
        EventSpec {
            name: "Summer Fest".to_string(),
            description: String::new(),
            location: "Main Square".to_string(),
            starts_at: Utc::now(),
            capacity: 10,
            waitlist_enabled: true,
            waitlist_limit: None,
        }
    }

    #[test]
    fn test_try_confirm_until_full_then_waitlist() {
        let mut cap = capacity(2, true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(cap.try_confirm(a), CapacityDecision::Confirmed);
        assert_eq!(cap.try_confirm(b), CapacityDecision::Confirmed);
        assert_eq!(
            cap.try_confirm(c),
            CapacityDecision::Waitlisted { position: 1 }
        );
        assert_eq!(cap.confirmed_count, 2);
        assert_eq!(cap.waitlist, VecDeque::from(vec![c]));
        assert!(cap.check_invariants().is_ok());
    }

    #[test]
    fn test_try_confirm_rejects_without_waitlist() {
        let mut cap = capacity(1, false);
        assert_eq!(cap.try_confirm(Uuid::new_v4()), CapacityDecision::Confirmed);
        assert_eq!(cap.try_confirm(Uuid::new_v4()), CapacityDecision::Rejected);
        assert_eq!(cap.confirmed_count, 1);
        assert!(cap.waitlist.is_empty());
    }

    #[test]
    fn test_try_confirm_rejects_when_waitlist_limit_reached() {
        let mut cap = EventCapacity::new(Uuid::new_v4(), 1, true, Some(1));
        cap.try_confirm(Uuid::new_v4());
        assert!(matches!(
            cap.try_confirm(Uuid::new_v4()),
            CapacityDecision::Waitlisted { .. }
        ));
        assert_eq!(cap.try_confirm(Uuid::new_v4()), CapacityDecision::Rejected);
    }

    #[test]
    fn test_cancel_confirmed_promotes_head_fifo() {
        let mut cap = capacity(1, true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cap.try_confirm(a);
        cap.try_confirm(b);
        cap.try_confirm(c);

        assert_eq!(cap.cancel(a, true).unwrap(), Some(b));
        assert_eq!(cap.confirmed_count, 1);
        assert_eq!(cap.waitlist, VecDeque::from(vec![c]));
        assert!(cap.check_invariants().is_ok());
    }

    #[test]
    fn test_cancel_waitlisted_leaves_count() {
        let mut cap = capacity(1, true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cap.try_confirm(a);
        cap.try_confirm(b);
        cap.try_confirm(c);

        assert_eq!(cap.cancel(b, false).unwrap(), None);
        assert_eq!(cap.confirmed_count, 1);
        assert_eq!(cap.waitlist, VecDeque::from(vec![c]));
    }

    #[test]
    fn test_cancel_confirmed_without_waitlist() {
        let mut cap = capacity(3, true);
        let a = Uuid::new_v4();
        cap.try_confirm(a);
        assert_eq!(cap.cancel(a, true).unwrap(), None);
        assert_eq!(cap.confirmed_count, 0);
    }

    #[test]
    fn test_cancel_unknown_waitlisted_user_is_integrity_error() {
        let mut cap = capacity(1, true);
        assert!(matches!(
            cap.cancel(Uuid::new_v4(), false),
            Err(ReservationError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_cancel_confirmed_on_empty_event_is_integrity_error() {
        let mut cap = capacity(1, true);
        assert!(matches!(
            cap.cancel(Uuid::new_v4(), true),
            Err(ReservationError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_capacity_bound_holds_over_mixed_sequence() {
        let mut cap = capacity(3, true);
        let users: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let mut confirmed = Vec::new();
        for user in &users {
            if cap.try_confirm(*user) == CapacityDecision::Confirmed {
                confirmed.push(*user);
            }
            assert!(cap.confirmed_count <= cap.capacity);
        }
        for user in confirmed {
            cap.cancel(user, true).unwrap();
            assert!(cap.confirmed_count <= cap.capacity);
            assert!(cap.check_invariants().is_ok());
        }
        assert_eq!(cap.confirmed_count, 3);
        assert_eq!(cap.waitlist.len(), 2);
    }

    #[test]
    fn test_check_invariants_detects_waitlist_on_open_event() {
        let mut cap = capacity(2, true);
        cap.waitlist.push_back(Uuid::new_v4());
        assert!(cap.check_invariants().is_err());
    }

    #[test]
    fn test_validate_lines() {
        let id = Uuid::new_v4();
        assert!(validate_lines(&[EquipmentLine {
            equipment_id: id,
            quantity: 2
        }])
        .is_ok());
        assert!(matches!(
            validate_lines(&[]),
            Err(ReservationError::Validation(_))
        ));
        assert!(validate_lines(&[EquipmentLine {
            equipment_id: id,
            quantity: 0
        }])
        .is_err());
        assert!(validate_lines(&[
            EquipmentLine {
                equipment_id: id,
                quantity: 1
            },
            EquipmentLine {
                equipment_id: id,
                quantity: 1
            },
        ])
        .is_err());
    }

    #[test]
    fn test_validate_spec() {
        assert!(validate_spec(&spec()).is_ok());

        let mut blank = spec();
        blank.location = "   ".to_string();
        assert!(validate_spec(&blank).is_err());

        let mut zero = spec();
        zero.capacity = 0;
        assert!(matches!(
            validate_spec(&zero),
            Err(ReservationError::Validation(msg)) if msg.contains("capacity")
        ));

        let mut negative_limit = spec();
        negative_limit.waitlist_limit = Some(-1);
        assert!(validate_spec(&negative_limit).is_err());
    }

    #[test]
    fn test_create_event_request_deserialize() {
        let json = r#"{
            "name": "Gala",
            "location": "Hall B",
            "starts_at": "2030-05-01T18:00:00Z",
            "capacity": 120,
            "equipment": [{"equipment_id": "00000000-0000-0000-0000-000000000001", "quantity": 3}]
        }"#;
        let req: CreateEventRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.event.capacity, 120);
        assert!(req.event.waitlist_enabled);
        assert_eq!(req.equipment.len(), 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_event_details_cost() {
        let event_id = Uuid::new_v4();
        let line = |qty: i32, cents: i64| EquipmentReservation {
            event_id,
            equipment_id: Uuid::new_v4(),
            quantity_reserved: qty,
            unit_price_at_reservation: Decimal::new(cents, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let event = Event {
            id: event_id,
            name: "Gala".into(),
            description: String::new(),
            location: "Hall".into(),
            starts_at: Utc::now(),
            created_by: Uuid::new_v4(),
            capacity: EventCapacity::new(event_id, 10, true, None),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let details = EventDetails::new(event, vec![line(2, 1000), line(3, 250)]);
        assert_eq!(details.equipment_cost, Decimal::new(2750, 2));
    }
}
