//! Registration entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Registration, RegistrationStatus};
use domain::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for registration_status that maps to PostgreSQL enum type.
///
/// There is no `pending` member: that state is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
pub enum RegistrationStatusDb {
    Confirmed,
    Waitlisted,
    Cancelled,
}

impl From<RegistrationStatusDb> for RegistrationStatus {
    fn from(db_status: RegistrationStatusDb) -> Self {
        match db_status {
            RegistrationStatusDb::Confirmed => RegistrationStatus::Confirmed,
            RegistrationStatusDb::Waitlisted => RegistrationStatus::Waitlisted,
            RegistrationStatusDb::Cancelled => RegistrationStatus::Cancelled,
        }
    }
}

impl TryFrom<RegistrationStatus> for RegistrationStatusDb {
    type Error = StoreError;

    fn try_from(status: RegistrationStatus) -> Result<Self, Self::Error> {
        match status {
            RegistrationStatus::Confirmed => Ok(RegistrationStatusDb::Confirmed),
            RegistrationStatus::Waitlisted => Ok(RegistrationStatusDb::Waitlisted),
            RegistrationStatus::Cancelled => Ok(RegistrationStatusDb::Cancelled),
            RegistrationStatus::Pending => Err(StoreError::Integrity(
                "pending registrations cannot be stored".to_string(),
            )),
        }
    }
}

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: String,
    pub status: RegistrationStatusDb,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<RegistrationEntity> for Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            user_id: entity.user_id,
            ticket_number: entity.ticket_number,
            status: entity.status.into(),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            cancelled_at: entity.cancelled_at,
        }
    }
}
