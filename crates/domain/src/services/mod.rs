//! Domain services for the reservation core.
//!
//! Services contain business logic that operates on domain models.

pub mod capacity_tracker;
pub mod equipment_catalog;
pub mod inventory_ledger;
pub mod memory_store;
pub mod notification;
pub mod reservation;
pub mod store;
pub mod ticket;
pub mod ticket_renderer;

pub use capacity_tracker::CapacityTracker;
pub use equipment_catalog::EquipmentCatalog;
pub use inventory_ledger::{InventoryLedger, StockDrift};
pub use memory_store::{FailurePoint, InMemoryReservationStore, MemoryState};
pub use notification::{
    dispatch_detached, MockNotificationDispatcher, Notice, NotificationDispatcher,
    NotificationKind, NotificationPayload, NotificationResult,
};
pub use reservation::{CoordinatorConfig, ReservationCoordinator};
pub use store::{
    ReleasedStock, ReservationStore, ReservationTx, ACTIVE_REGISTRATION_CONSTRAINT,
    TICKET_NUMBER_CONSTRAINT,
};
pub use ticket::{TicketNumberGenerator, TimestampTicketGenerator, DEFAULT_TICKET_MAX_ATTEMPTS};
pub use ticket_renderer::{PlainTextTicketRenderer, RenderedDocument, TicketRenderer};
