//! Service implementations that sit outside the reservation core.

pub mod notification;

pub use notification::{
    build_dispatcher, ConsoleNotificationDispatcher, DatabaseNotificationDispatcher,
    DisabledNotificationDispatcher,
};
