//! Event capacity and waitlist tracking.
//!
//! The event row is locked for the whole read-decide-write sequence, so two
//! registrations for the same event never decide against the same counters.

use std::sync::Arc;

use metrics::counter;
use uuid::Uuid;

use crate::errors::{ReservationError, ReservationResult};
use crate::models::{CapacityDecision, EventCapacity};
use crate::services::store::{ReservationStore, ReservationTx};

#[derive(Clone)]
pub struct CapacityTracker {
    store: Arc<dyn ReservationStore>,
}

impl CapacityTracker {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    pub async fn capacity(&self, event_id: Uuid) -> ReservationResult<EventCapacity> {
        let mut tx = self.store.begin().await?;
        let event = tx
            .find_event(event_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Event {}", event_id)))?;
        tx.rollback().await?;
        Ok(event.capacity)
    }

    /// Standalone decision in its own transaction. Only tests use it, since
    /// outside the coordinator it would change the counters without writing
    /// the matching registration row.
    #[cfg(test)]
    pub(crate) async fn try_confirm(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> ReservationResult<CapacityDecision> {
        let mut tx = self.store.begin().await?;
        let decision = Self::try_confirm_in(tx.as_mut(), event_id, user_id).await?;
        tx.commit().await?;
        Ok(decision)
    }

    #[cfg(test)]
    pub(crate) async fn cancel(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        was_confirmed: bool,
    ) -> ReservationResult<Option<Uuid>> {
        let mut tx = self.store.begin().await?;
        let promoted = Self::cancel_in(tx.as_mut(), event_id, user_id, was_confirmed).await?;
        tx.commit().await?;
        Ok(promoted)
    }

    /// Decides and records confirmed vs waitlisted vs rejected for `user_id`.
    ///
    /// A rejection writes nothing. The caller writes the registration row in
    /// the same transaction.
    pub(crate) async fn try_confirm_in(
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
        user_id: Uuid,
    ) -> ReservationResult<CapacityDecision> {
        let mut event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Event {}", event_id)))?;

        let decision = event.capacity.try_confirm(user_id);
        if decision != CapacityDecision::Rejected {
            event.capacity.check_invariants()?;
            tx.save_capacity(&event.capacity).await?;
        }

        tracing::info!(
            event_id = %event_id,
            user_id = %user_id,
            decision = ?decision,
            confirmed_count = event.capacity.confirmed_count,
            capacity = event.capacity.capacity,
            waitlist_len = event.capacity.waitlist.len(),
            "Capacity decision"
        );
        Ok(decision)
    }

    /// Frees the slot held by `user_id`; returns the promoted user, if any.
    ///
    /// The caller updates both registration rows in the same transaction.
    pub(crate) async fn cancel_in(
        tx: &mut dyn ReservationTx,
        event_id: Uuid,
        user_id: Uuid,
        was_confirmed: bool,
    ) -> ReservationResult<Option<Uuid>> {
        let mut event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Event {}", event_id)))?;

        let promoted = event.capacity.cancel(user_id, was_confirmed)?;
        event.capacity.check_invariants()?;
        tx.save_capacity(&event.capacity).await?;

        if let Some(promoted) = promoted {
            counter!("waitlist_promotions_total").increment(1);
            tracing::info!(
                event_id = %event_id,
                cancelled_user_id = %user_id,
                promoted_user_id = %promoted,
                "Waitlist head promoted"
            );
        }
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Event;
    use crate::services::memory_store::InMemoryReservationStore;
    use chrono::Utc;
    use std::collections::VecDeque;

    async fn setup(capacity: i32, waitlist: bool) -> (CapacityTracker, Uuid) {
        let store = InMemoryReservationStore::new();
        let event_id = Uuid::new_v4();
        let event = Event {
            id: event_id,
            name: "Workshop".into(),
            description: String::new(),
            location: "Lab".into(),
            starts_at: Utc::now(),
            created_by: Uuid::new_v4(),
            capacity: EventCapacity::new(event_id, capacity, waitlist, None),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut tx = store.begin().await.unwrap();
        tx.insert_event(&event).await.unwrap();
        tx.commit().await.unwrap();
        (CapacityTracker::new(Arc::new(store)), event_id)
    }

    #[tokio::test]
    async fn test_waitlist_is_fifo() {
        let (tracker, event_id) = setup(1, true).await;
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for user in &users {
            tracker.try_confirm(event_id, *user).await.unwrap();
        }

        assert_eq!(
            tracker.cancel(event_id, users[0], true).await.unwrap(),
            Some(users[1])
        );
        assert_eq!(
            tracker.cancel(event_id, users[1], true).await.unwrap(),
            Some(users[2])
        );
        assert_eq!(
            tracker.cancel(event_id, users[2], true).await.unwrap(),
            Some(users[3])
        );

        let capacity = tracker.capacity(event_id).await.unwrap();
        assert_eq!(capacity.confirmed_count, 1);
        assert_eq!(capacity.waitlist, VecDeque::new());
    }

    #[tokio::test]
    async fn test_rejected_when_full_without_waitlist() {
        let (tracker, event_id) = setup(1, false).await;
        assert_eq!(
            tracker.try_confirm(event_id, Uuid::new_v4()).await.unwrap(),
            CapacityDecision::Confirmed
        );
        assert_eq!(
            tracker.try_confirm(event_id, Uuid::new_v4()).await.unwrap(),
            CapacityDecision::Rejected
        );
    }

    #[tokio::test]
    async fn test_concurrent_confirms_respect_capacity() {
        let (tracker, event_id) = setup(5, true).await;
        let handles: Vec<_> = (0..40)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.try_confirm(event_id, Uuid::new_v4()).await })
            })
            .collect();

        let mut confirmed = 0;
        let mut waitlisted = Vec::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                CapacityDecision::Confirmed => confirmed += 1,
                CapacityDecision::Waitlisted { position } => waitlisted.push(position),
                CapacityDecision::Rejected => panic!("waitlist is enabled"),
            }
        }
        waitlisted.sort_unstable();

        assert_eq!(confirmed, 5);
        assert_eq!(waitlisted, (1..=35).collect::<Vec<_>>());
        let capacity = tracker.capacity(event_id).await.unwrap();
        assert_eq!(capacity.confirmed_count, 5);
        assert_eq!(capacity.waitlist.len(), 35);
    }

    #[tokio::test]
    async fn test_unknown_event() {
        let (tracker, _) = setup(1, true).await;
        assert!(matches!(
            tracker.try_confirm(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(ReservationError::NotFound(_))
        ));
    }
}
