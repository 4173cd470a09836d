//! Ticket number generation.

use chrono::Utc;
use rand::Rng;

/// Default number of candidates tried before giving up with a collision error.
pub const DEFAULT_TICKET_MAX_ATTEMPTS: u32 = 8;

/// Produces ticket number candidates. Uniqueness is enforced by the caller.
pub trait TicketNumberGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// `TKT-<last 6 digits of the epoch millis>-<4 random digits>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampTicketGenerator;

impl TicketNumberGenerator for TimestampTicketGenerator {
    fn generate(&self) -> String {
        let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
        let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
        format!("TKT-{:06}-{:04}", millis, suffix)
    }
}
