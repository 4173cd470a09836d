//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a reservation store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the connection failed mid-operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The transaction was aborted by the store (deadlock, serialization, commit failure).
    #[error("Transaction aborted: {0}")]
    Aborted(String),

    /// A unique constraint rejected the write. Carries the constraint name when known.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Stored data could not be mapped onto the domain model.
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                ),
                Some("40001") | Some("40P01") => StoreError::Aborted(db_err.to_string()),
                Some("23514") => StoreError::Integrity(db_err.to_string()),
                _ => StoreError::Unavailable(db_err.to_string()),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Integrity(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Errors surfaced by the reservation core.
///
/// Every variant is distinguishable by callers; the API layer maps each one to
/// its own status code and error code.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock for equipment {equipment_id}: requested {requested}, available {available}")]
    InsufficientStock {
        equipment_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Equipment {0} is not approved for reservation")]
    EquipmentUnavailable(Uuid),

    #[error("Equipment {0} is reserved by at least one event")]
    EquipmentInUse(Uuid),

    #[error("Event {0} is full")]
    EventFull(Uuid),

    #[error("User {user_id} is already registered for event {event_id}")]
    AlreadyRegistered { event_id: Uuid, user_id: Uuid },

    #[error("Registration {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("Could not allocate a unique ticket number after {attempts} attempts")]
    TicketCollision { attempts: u32 },

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Ticket rendering failed: {0}")]
    Rendering(String),

    #[error(transparent)]
    Persistence(StoreError),
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Integrity(msg) => ReservationError::DataIntegrity(msg),
            other => ReservationError::Persistence(other),
        }
    }
}

impl From<validator::ValidationErrors> for ReservationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();
        messages.sort();
        ReservationError::Validation(messages.join("; "))
    }
}

/// Result alias for reservation operations.
pub type ReservationResult<T> = Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_integrity_maps_to_data_integrity() {
        let err: ReservationError = StoreError::Integrity("bad status".into()).into();
        assert!(matches!(err, ReservationError::DataIntegrity(_)));
    }

    #[test]
    fn test_store_unavailable_maps_to_persistence() {
        let err: ReservationError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(
            err,
            ReservationError::Persistence(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_sqlx_row_not_found_is_unavailable() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_insufficient_stock_display() {
        let id = Uuid::nil();
        let err = ReservationError::InsufficientStock {
            equipment_id: id,
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            format!(
                "Insufficient stock for equipment {}: requested 5, available 3",
                id
            )
        );
    }
}
