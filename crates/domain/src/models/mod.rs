//! Domain models for the reservation service.

pub mod equipment;
pub mod event;
pub mod registration;
pub mod reservation;

pub use equipment::{
    CreateEquipmentRequest, EquipmentStatus, EquipmentStock, RestockRequest,
    UpdateEquipmentStatusRequest,
};
pub use event::{
    AddEquipmentRequest, CapacityDecision, CreateEventRequest, EquipmentLine, Event,
    EventCapacity, EventDetails, EventSpec, UpdateEquipmentQuantityRequest,
};
pub use registration::{Registration, RegistrationOutcome, RegistrationStatus};
pub use reservation::EquipmentReservation;
