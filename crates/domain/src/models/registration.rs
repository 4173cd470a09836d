//! Event registration (ticket) domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a registration.
///
/// `Pending` only exists while a registration is being decided and is never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Waitlisted,
    Cancelled,
}

impl RegistrationStatus {
    pub fn can_transition_to(self, next: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Waitlisted)
                | (Confirmed, Cancelled)
                | (Waitlisted, Cancelled)
                | (Waitlisted, Confirmed)
        )
    }

    pub fn is_active(self) -> bool {
        self != RegistrationStatus::Cancelled
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Pending => write!(f, "pending"),
            RegistrationStatus::Confirmed => write!(f, "confirmed"),
            RegistrationStatus::Waitlisted => write!(f, "waitlisted"),
            RegistrationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            other => Err(format!("Unknown registration status: {}", other)),
        }
    }
}

/// A user's registration for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Result of a successful registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "registration")]
pub enum RegistrationOutcome {
    Confirmed(Registration),
    Waitlisted(Registration),
}

impl RegistrationOutcome {
    pub fn registration(&self) -> &Registration {
        match self {
            RegistrationOutcome::Confirmed(r) | RegistrationOutcome::Waitlisted(r) => r,
        }
    }

    pub fn into_registration(self) -> Registration {
        match self {
            RegistrationOutcome::Confirmed(r) | RegistrationOutcome::Waitlisted(r) => r,
        }
    }
}
