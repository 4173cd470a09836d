//! Event equipment line repository for database operations.

use domain::models::EquipmentReservation;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::EventEquipmentEntity;
use crate::metrics::QueryTimer;

/// Repository for event_equipment rows.
pub struct EventEquipmentRepository;

impl EventEquipmentRepository {
    /// Insert a reservation line.
    pub async fn insert(
        conn: &mut PgConnection,
        line: &EquipmentReservation,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_event_equipment");
        let result = sqlx::query(
            r#"
            INSERT INTO event_equipment (event_id, equipment_id, quantity_reserved,
                                         unit_price_at_reservation, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.event_id)
        .bind(line.equipment_id)
        .bind(line.quantity_reserved)
        .bind(line.unit_price_at_reservation)
        .bind(line.created_at)
        .bind(line.updated_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Find one line.
    pub async fn find(
        conn: &mut PgConnection,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> Result<Option<EventEquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_equipment");
        let result = sqlx::query_as::<_, EventEquipmentEntity>(
            r#"
            SELECT * FROM event_equipment
            WHERE event_id = $1 AND equipment_id = $2
            "#,
        )
        .bind(event_id)
        .bind(equipment_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// All lines of an event in equipment id order, which is also the order
    /// equipment rows are locked in.
    pub async fn find_by_event(
        conn: &mut PgConnection,
        event_id: Uuid,
    ) -> Result<Vec<EventEquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_equipment_by_event");
        let result = sqlx::query_as::<_, EventEquipmentEntity>(
            r#"
            SELECT * FROM event_equipment
            WHERE event_id = $1
            ORDER BY equipment_id
            "#,
        )
        .bind(event_id)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }

    /// Change the reserved quantity of a line.
    pub async fn update_quantity(
        conn: &mut PgConnection,
        event_id: Uuid,
        equipment_id: Uuid,
        quantity: i32,
    ) -> Result<Option<EventEquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_event_equipment_quantity");
        let result = sqlx::query_as::<_, EventEquipmentEntity>(
            r#"
            UPDATE event_equipment
            SET quantity_reserved = $3, updated_at = NOW()
            WHERE event_id = $1 AND equipment_id = $2
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(equipment_id)
        .bind(quantity)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Delete one line.
    pub async fn delete(
        conn: &mut PgConnection,
        event_id: Uuid,
        equipment_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_event_equipment");
        let result = sqlx::query(
            r#"
            DELETE FROM event_equipment WHERE event_id = $1 AND equipment_id = $2
            "#,
        )
        .bind(event_id)
        .bind(equipment_id)
        .execute(conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// Delete all lines of an event.
    pub async fn delete_by_event(conn: &mut PgConnection, event_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_event_equipment_by_event");
        let result = sqlx::query(
            r#"
            DELETE FROM event_equipment WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Units of one equipment item held across all events.
    pub async fn sum_reserved_for_equipment(
        conn: &mut PgConnection,
        equipment_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("sum_reserved_for_equipment");
        let result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(quantity_reserved), 0)::BIGINT
            FROM event_equipment
            WHERE equipment_id = $1
            "#,
        )
        .bind(equipment_id)
        .fetch_one(conn)
        .await;
        timer.record();
        result.map(|(sum,)| sum)
    }
}
