//! # Subscriber Capability
//!
//! The minimal contract every listener implements: an identity, the callback id
//! it listens for, the payload size it expects, flags, and an invoke operation.
//!
//! Registries never own subscribers. Application code keeps the `Arc` and must
//! unregister before dropping it; the registries hold `Weak` references and skip
//! entries whose subscriber is already gone.
//!
//! ## Usage
//!
//! ```rust
//! use callback_dispatch::subscriber::{from_fn, Subscriber};
//! use callback_dispatch::{CallbackId, DispatchContext};
//!
//! let listener = from_fn(CallbackId(304), 12, DispatchContext::Client, |payload: &[u8]| {
//!     assert_eq!(payload.len(), 12);
//!     Ok(())
//! });
//! assert!(!listener.base().is_registered());
//! ```

mod from_fn;

use crate::constants::flags;
use crate::error::{SubscriberError, SubscriberResult};
use crate::types::{CallHandle, CallbackId, DispatchContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};
use uuid::Uuid;

pub use from_fn::{call_result_fn, from_fn, FnCallResult, FnSubscriber};

/// Stable per-instance identity used instead of pointer comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State shared by every subscriber implementation
///
/// Flags use interior mutability so the registries can update them through the
/// shared references they hold. The `REGISTERED` bit tracks callback-registry
/// membership; outstanding call-result registrations are counted separately.
#[derive(Debug)]
pub struct CallbackBase {
    id: SubscriberId,
    callback_id: AtomicI32,
    payload_size: usize,
    flags: AtomicU8,
    pending_calls: AtomicU32,
}

impl CallbackBase {
    pub fn new(callback_id: CallbackId, payload_size: usize, context: DispatchContext) -> Self {
        let initial = if context.is_game_server() {
            flags::GAME_SERVER
        } else {
            0
        };
        Self {
            id: SubscriberId::new(),
            callback_id: AtomicI32::new(callback_id.0),
            payload_size,
            flags: AtomicU8::new(initial),
            pending_calls: AtomicU32::new(0),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn callback_id(&self) -> CallbackId {
        CallbackId(self.callback_id.load(Ordering::Acquire))
    }

    /// Byte size of the payload this subscriber expects for call results
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub fn context(&self) -> DispatchContext {
        let server = self.flags.load(Ordering::Acquire) & flags::GAME_SERVER != 0;
        DispatchContext::from_game_server(server)
    }

    /// Present in the callback registry or waiting on at least one call result
    pub fn is_registered(&self) -> bool {
        self.holds_callback() || self.pending_calls() > 0
    }

    /// Present in the callback registry
    pub fn holds_callback(&self) -> bool {
        self.flags.load(Ordering::Acquire) & flags::REGISTERED != 0
    }

    /// Number of call handles this subscriber is waiting on
    pub fn pending_calls(&self) -> u32 {
        self.pending_calls.load(Ordering::Acquire)
    }

    /// Flag bits; `REGISTERED` is reported while any registration is live
    pub fn flags(&self) -> u8 {
        let bits = self.flags.load(Ordering::Acquire);
        if self.pending_calls() > 0 {
            bits | flags::REGISTERED
        } else {
            bits
        }
    }

    /// Sets the registered flag, returning whether it was previously clear
    pub(crate) fn mark_registered(&self, callback_id: CallbackId) -> bool {
        self.callback_id.store(callback_id.0, Ordering::Release);
        self.flags.fetch_or(flags::REGISTERED, Ordering::AcqRel) & flags::REGISTERED == 0
    }

    pub(crate) fn mark_pending(&self) {
        self.pending_calls.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops one outstanding call-result registration
    pub(crate) fn release_pending(&self) {
        let _ = self
            .pending_calls
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Clears the registered flag, returning whether it was previously set
    pub(crate) fn clear_registered(&self) -> bool {
        self.flags.fetch_and(!flags::REGISTERED, Ordering::AcqRel) & flags::REGISTERED != 0
    }
}

/// Listener for a callback id or for one call handle's result
pub trait Subscriber: Send + Sync {
    fn base(&self) -> &CallbackBase;

    /// Handle a broadcast callback payload
    fn run(&self, payload: &[u8]) -> SubscriberResult;

    /// Handle the materialized result of an asynchronous call
    fn run_call_result(
        &self,
        payload: &[u8],
        io_failed: bool,
        call: CallHandle,
    ) -> SubscriberResult {
        let _ = (io_failed, call);
        self.run(payload)
    }

    /// Get subscriber name for identification
    fn name(&self) -> &str {
        crate::constants::UNNAMED_SUBSCRIBER
    }
}

/// Fixed-layout payload published under a well-known callback id
pub trait CallbackPayload: Sized {
    const CALLBACK_ID: CallbackId;
    const SIZE: usize;

    fn decode(bytes: &[u8]) -> Result<Self, SubscriberError>;

    fn encode(&self) -> Vec<u8>;

    /// Length check shared by decoders
    fn ensure_size(bytes: &[u8]) -> Result<(), SubscriberError> {
        if bytes.len() < Self::SIZE {
            return Err(SubscriberError::MalformedPayload {
                callback_id: Self::CALLBACK_ID,
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Ok(())
    }
}
