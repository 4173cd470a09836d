//! Event repository for database operations.

use domain::models::{Event, EventCapacity};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::EventEntity;
use crate::metrics::QueryTimer;

/// Repository for event rows and their capacity counters.
pub struct EventRepository;

impl EventRepository {
    /// Insert a new event.
    pub async fn insert(conn: &mut PgConnection, event: &Event) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_event");
        let waitlist: Vec<Uuid> = event.capacity.waitlist.iter().copied().collect();
        let result = sqlx::query(
            r#"
            INSERT INTO events (id, name, description, location, starts_at, created_by,
                                capacity, confirmed_count, waitlist, waitlist_enabled,
                                waitlist_limit, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.created_by)
        .bind(event.capacity.capacity)
        .bind(event.capacity.confirmed_count)
        .bind(waitlist)
        .bind(event.capacity.waitlist_enabled)
        .bind(event.capacity.waitlist_limit)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Find event by ID.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT * FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Find event by ID and hold a row lock until the transaction ends.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT * FROM events WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Write back confirmed count and waitlist.
    pub async fn save_capacity(
        conn: &mut PgConnection,
        capacity: &EventCapacity,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("save_event_capacity");
        let waitlist: Vec<Uuid> = capacity.waitlist.iter().copied().collect();
        let result = sqlx::query(
            r#"
            UPDATE events
            SET confirmed_count = $2, waitlist = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(capacity.event_id)
        .bind(capacity.confirmed_count)
        .bind(waitlist)
        .execute(conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// Delete an event.
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_event");
        let result = sqlx::query(
            r#"
            DELETE FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }
}
