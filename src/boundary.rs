//! # External Service Boundary
//!
//! Capability traits the dispatcher consumes from the handle-based service.
//! How these are resolved (a loaded module's function table, an in-process
//! fake) is outside the dispatch core; the dispatcher only sees the injected
//! trait objects.

use crate::types::{CallHandle, CallbackId, CallbackMessage, PipeHandle};
use parking_lot::RwLock;
use std::sync::Arc;

/// Outcome of copying a completed call's result into caller storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterializeOutcome {
    /// Result bytes were written to the buffer
    pub ok: bool,
    /// The call itself completed with an I/O failure
    pub io_failed: bool,
}

impl MaterializeOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            io_failed: false,
        }
    }

    pub fn io_failure() -> Self {
        Self {
            ok: true,
            io_failed: true,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Poll-style message channel of the external service
pub trait CallbackService: Send + Sync {
    /// Next queued message for `pipe`, or `None` when the queue is empty.
    /// Must not wait for new messages.
    fn poll_next_message(&self, pipe: PipeHandle) -> Option<CallbackMessage>;

    /// Release the resources of the message most recently returned for `pipe`
    fn release_last_message(&self, pipe: PipeHandle);

    /// Copy the result of `call` into `buffer`
    fn materialize_call_result(
        &self,
        pipe: PipeHandle,
        call: CallHandle,
        buffer: &mut [u8],
        callback_id: CallbackId,
    ) -> MaterializeOutcome;
}

/// Secondary observer notified of every routed message
pub trait DispatchSink: Send + Sync {
    fn on_dispatched(&self, message: &CallbackMessage, handled: bool);
}

/// Capability set bound to a dispatcher
#[derive(Clone)]
pub struct Capabilities {
    pub service: Arc<dyn CallbackService>,
    pub sink: Option<Arc<dyn DispatchSink>>,
}

impl Capabilities {
    pub fn new(service: Arc<dyn CallbackService>) -> Self {
        Self {
            service,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DispatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("service", &"<Arc<dyn CallbackService>>".to_string())
            .field("sink", &self.sink.as_ref().map(|_| "<Arc<dyn DispatchSink>>"))
            .finish()
    }
}

/// Late-bound capability storage shared by the dispatcher and the completion
/// subscribers. Readers clone the `Arc`s out so no lock is held across calls
/// into the service.
#[derive(Debug, Default)]
pub struct CapabilitySlot {
    inner: RwLock<Option<Capabilities>>,
}

impl CapabilitySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind capabilities, returning the previously bound set
    pub fn bind(&self, capabilities: Capabilities) -> Option<Capabilities> {
        self.inner.write().replace(capabilities)
    }

    pub fn unbind(&self) -> Option<Capabilities> {
        self.inner.write().take()
    }

    pub fn get(&self) -> Option<Capabilities> {
        self.inner.read().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.read().is_some()
    }
}
