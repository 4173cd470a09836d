//! Domain layer for the event rental backend.
//!
//! This crate contains:
//! - Domain models (EquipmentStock, Event, EventCapacity, Registration)
//! - Reservation services (inventory ledger, capacity tracker, coordinator)
//! - The store abstraction and an in-memory store
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;

pub use errors::{ReservationError, ReservationResult, StoreError};
