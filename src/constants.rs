//! # System Constants
//!
//! Well-known callback ids, subscriber flag bits and payload layouts shared with
//! the external service.

use crate::types::CallbackId;

/// Well-known callback ids published by the service
pub mod callback_ids {
    use super::CallbackId;

    /// Base of the utility callback range
    pub const UTILS_CALLBACK_BASE: i32 = 700;

    /// "Asynchronous call completed" notification
    pub const CALL_COMPLETED: CallbackId = CallbackId(UTILS_CALLBACK_BASE + 3);
}

/// Subscriber flag bits
pub mod flags {
    /// Subscriber is currently present in a registry
    pub const REGISTERED: u8 = 0x01;
    /// Subscriber listens in the game-server context
    pub const GAME_SERVER: u8 = 0x02;
}

/// Byte size of the call-completed payload: call handle (u64), callback id (i32),
/// result size (u32), little-endian
pub const CALL_COMPLETED_PAYLOAD_SIZE: usize = 16;

/// Subscriber name reported when an implementation does not provide one
pub const UNNAMED_SUBSCRIBER: &str = "unnamed_subscriber";
