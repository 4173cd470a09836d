//! Event entity (database row mapping).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use domain::models::{Event, EventCapacity};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the events table.
///
/// The waitlist is stored in FIFO order as a `UUID[]` column.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub capacity: i32,
    pub confirmed_count: i32,
    pub waitlist: Vec<Uuid>,
    pub waitlist_enabled: bool,
    pub waitlist_limit: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventEntity> for Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            location: entity.location,
            starts_at: entity.starts_at,
            created_by: entity.created_by,
            capacity: EventCapacity {
                event_id: entity.id,
                capacity: entity.capacity,
                confirmed_count: entity.confirmed_count,
                waitlist: VecDeque::from(entity.waitlist),
                waitlist_enabled: entity.waitlist_enabled,
                waitlist_limit: entity.waitlist_limit,
            },
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waitlist_order_preserved() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let entity = EventEntity {
            id: Uuid::new_v4(),
            name: "Hackathon".to_string(),
            description: String::new(),
            location: "Campus".to_string(),
            starts_at: Utc::now(),
            created_by: Uuid::new_v4(),
            capacity: 2,
            confirmed_count: 2,
            waitlist: vec![a, b, c],
            waitlist_enabled: true,
            waitlist_limit: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let event: Event = entity.into();
        assert_eq!(event.capacity.waitlist, VecDeque::from(vec![a, b, c]));
        assert_eq!(event.capacity.event_id, event.id);
        assert!(event.capacity.check_invariants().is_ok());
    }
}
