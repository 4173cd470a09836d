//! Repository implementations for database operations.
//!
//! Transactional repositories take a `&mut PgConnection`; the notification
//! repository owns a pool because it writes outside any reservation transaction.

pub mod equipment;
pub mod event;
pub mod notification;
pub mod registration;
pub mod reservation;

pub use equipment::EquipmentRepository;
pub use event::EventRepository;
pub use notification::{NewNotification, NotificationRepository};
pub use registration::RegistrationRepository;
pub use reservation::EventEquipmentRepository;
