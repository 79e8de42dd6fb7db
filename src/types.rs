//! # Core Types
//!
//! Handle newtypes shared by the registries, the router and the external
//! service boundary. Handles are plain values; zero is the null/invalid value
//! for every kind, matching the service's own convention.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Communication pipe to the external service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PipeHandle(pub i32);

impl PipeHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// User on whose behalf the service produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UserHandle(pub i32);

impl UserHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// Opaque identifier for one outstanding asynchronous call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CallHandle(pub u64);

impl CallHandle {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Numeric message-type id identifying a payload schema
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CallbackId(pub i32);

impl fmt::Display for PipeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partition selecting which of two subscriber sets receives a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchContext {
    #[default]
    Client,
    GameServer,
}

impl DispatchContext {
    pub fn from_game_server(is_game_server: bool) -> Self {
        if is_game_server {
            Self::GameServer
        } else {
            Self::Client
        }
    }

    pub fn is_game_server(self) -> bool {
        matches!(self, Self::GameServer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::GameServer => "game_server",
        }
    }
}

impl fmt::Display for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message drained from the external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackMessage {
    /// Originating user
    pub user: UserHandle,
    /// Message-type id
    pub callback_id: CallbackId,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl CallbackMessage {
    pub fn new(user: UserHandle, callback_id: CallbackId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            user,
            callback_id,
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles() {
        assert!(PipeHandle::NULL.is_null());
        assert!(!PipeHandle(3).is_null());
        assert!(UserHandle::default().is_null());
        assert!(!CallHandle::INVALID.is_valid());
        assert!(CallHandle(42).is_valid());
    }

    #[test]
    fn test_context_from_flag() {
        assert_eq!(DispatchContext::from_game_server(false), DispatchContext::Client);
        assert_eq!(
            DispatchContext::from_game_server(true),
            DispatchContext::GameServer
        );
        assert!(DispatchContext::GameServer.is_game_server());
        assert_eq!(DispatchContext::Client.to_string(), "client");
    }

    #[test]
    fn test_call_handle_display_is_hex() {
        assert_eq!(CallHandle(255).to_string(), "0xff");
    }
}
