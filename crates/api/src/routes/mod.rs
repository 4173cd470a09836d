//! HTTP route handlers.

pub mod equipment;
pub mod events;
pub mod health;
pub mod registrations;
