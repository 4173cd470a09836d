//! Equipment repository for database operations.
//!
//! All functions run on a caller-supplied connection so they can take part in
//! a reservation transaction.

use domain::models::{EquipmentStatus, EquipmentStock};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::{EquipmentEntity, EquipmentStatusDb};
use crate::metrics::QueryTimer;

/// Repository for equipment stock rows.
pub struct EquipmentRepository;

impl EquipmentRepository {
    /// Insert a new listing.
    pub async fn insert(conn: &mut PgConnection, equipment: &EquipmentStock) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_equipment");
        let result = sqlx::query(
            r#"
            INSERT INTO equipment (id, vendor_id, name, description, quantity, reserved_count,
                                   unit_price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(equipment.id)
        .bind(equipment.vendor_id)
        .bind(&equipment.name)
        .bind(&equipment.description)
        .bind(equipment.quantity)
        .bind(equipment.reserved_count)
        .bind(equipment.unit_price)
        .bind(EquipmentStatusDb::from(equipment.status))
        .bind(equipment.created_at)
        .bind(equipment.updated_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Find equipment by ID.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<EquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_equipment_by_id");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            SELECT * FROM equipment WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Find equipment by ID and hold a row lock until the transaction ends.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<EquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_equipment_by_id");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            SELECT * FROM equipment WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// List all equipment IDs.
    pub async fn list_ids(conn: &mut PgConnection) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("list_equipment_ids");
        let result: Result<Vec<(Uuid,)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id FROM equipment ORDER BY id
            "#,
        )
        .fetch_all(conn)
        .await;
        timer.record();
        result.map(|rows| rows.into_iter().map(|(id,)| id).collect())
    }

    /// Move units from available to reserved if the equipment is approved and
    /// has enough available stock. Returns `None` when nothing matched.
    pub async fn conditional_decrement(
        conn: &mut PgConnection,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("reserve_equipment_stock");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            UPDATE equipment
            SET quantity = quantity - $2,
                reserved_count = reserved_count + $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'approved' AND quantity >= $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(units)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Move up to `units` from reserved back to available.
    ///
    /// Returns the updated row and the number of units actually moved.
    pub async fn release(
        conn: &mut PgConnection,
        id: Uuid,
        units: i32,
    ) -> Result<Option<(EquipmentEntity, i32)>, sqlx::Error> {
        let timer = QueryTimer::new("release_equipment_stock");
        let locked = Self::lock_by_id(&mut *conn, id).await;
        let result = match locked {
            Ok(Some(current)) => {
                let moved = units.min(current.reserved_count);
                sqlx::query_as::<_, EquipmentEntity>(
                    r#"
                    UPDATE equipment
                    SET quantity = quantity + $2,
                        reserved_count = reserved_count - $2,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(moved)
                .fetch_one(conn)
                .await
                .map(|row| Some((row, moved)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Add owned units to available stock.
    pub async fn add_stock(
        conn: &mut PgConnection,
        id: Uuid,
        units: i32,
    ) -> Result<Option<EquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("restock_equipment");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            UPDATE equipment
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(units)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Overwrite both counters (reconciliation repair only).
    pub async fn set_counts(
        conn: &mut PgConnection,
        id: Uuid,
        quantity: i32,
        reserved_count: i32,
    ) -> Result<Option<EquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_equipment_counts");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            UPDATE equipment
            SET quantity = $2, reserved_count = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(reserved_count)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Update moderation status. Counters are left untouched.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: EquipmentStatus,
    ) -> Result<Option<EquipmentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_equipment_status");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            UPDATE equipment
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(EquipmentStatusDb::from(status))
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Delete a listing.
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_equipment");
        let result = sqlx::query(
            r#"
            DELETE FROM equipment WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }
}
