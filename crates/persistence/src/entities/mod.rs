//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod equipment;
pub mod event;
pub mod notification;
pub mod registration;
pub mod reservation;

pub use equipment::{EquipmentEntity, EquipmentStatusDb};
pub use event::EventEntity;
pub use notification::NotificationEntity;
pub use registration::{RegistrationEntity, RegistrationStatusDb};
pub use reservation::EventEquipmentEntity;
