//! Registration repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::{RegistrationEntity, RegistrationStatusDb};
use crate::metrics::QueryTimer;

/// Repository for registration rows.
pub struct RegistrationRepository;

impl RegistrationRepository {
    /// Insert a registration. Unique index violations surface as database errors.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        conn: &mut PgConnection,
        id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        ticket_number: &str,
        status: RegistrationStatusDb,
        created_at: DateTime<Utc>,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_registration");
        let result = sqlx::query(
            r#"
            INSERT INTO registrations (id, event_id, user_id, ticket_number, status,
                                       created_at, updated_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(user_id)
        .bind(ticket_number)
        .bind(status)
        .bind(created_at)
        .bind(cancelled_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Find registration by ID.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Find registration by ID and hold a row lock until the transaction ends.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// The live (non-cancelled) registration of a user for an event.
    pub async fn find_active(
        conn: &mut PgConnection,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations
            WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// The waitlisted registration of a user for an event.
    pub async fn find_waitlisted(
        conn: &mut PgConnection,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_waitlisted_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations
            WHERE event_id = $1 AND user_id = $2 AND status = 'waitlisted'
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// All live registrations of an event, oldest first.
    pub async fn find_active_by_event(
        conn: &mut PgConnection,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_registrations_by_event");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations
            WHERE event_id = $1 AND status <> 'cancelled'
            ORDER BY created_at, id
            "#,
        )
        .bind(event_id)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }

    /// Check whether a ticket number is already taken.
    pub async fn ticket_exists(conn: &mut PgConnection, ticket_number: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("registration_ticket_exists");
        let result: Result<(bool,), sqlx::Error> = sqlx::query_as(
            r#"
            SELECT EXISTS(SELECT 1 FROM registrations WHERE ticket_number = $1)
            "#,
        )
        .bind(ticket_number)
        .fetch_one(conn)
        .await;
        timer.record();
        result.map(|(exists,)| exists)
    }

    /// Update status and cancellation timestamp.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: RegistrationStatusDb,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_registration_status");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            UPDATE registrations
            SET status = $2, cancelled_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(cancelled_at)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Delete all registrations of an event.
    pub async fn delete_by_event(conn: &mut PgConnection, event_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_registrations_by_event");
        let result = sqlx::query(
            r#"
            DELETE FROM registrations WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
