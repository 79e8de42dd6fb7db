#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Callback Dispatch
//!
//! In-process event dispatch and pending call-result registry for a
//! handle-based external service reached through a poll-style channel.
//!
//! ## Overview
//!
//! Application code subscribes in two ways:
//!
//! - **Callbacks**: recurring broadcast notifications addressed by a numeric
//!   callback id. Many subscribers may share an id; per message, the
//!   earliest-registered subscriber whose context (client or game server)
//!   matches the drain is invoked.
//! - **Call results**: the one-shot result of an asynchronous call, addressed by
//!   its call handle and delivered at most once.
//!
//! A host periodically drains a pipe. The dispatcher polls the service for each
//! queued message, routes it, and releases it, until the queue is empty.
//!
//! ## Module Organization
//!
//! - [`dispatch`] - Drain loop, router, completion flow, dispatch state
//! - [`registry`] - Callback and pending call-result registries
//! - [`subscriber`] - Subscriber capability and closure adapters
//! - [`boundary`] - External service capabilities
//! - [`global`] - Process-wide procedural surface
//! - [`config`] - Configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use callback_dispatch::subscriber::from_fn;
//! use callback_dispatch::{
//!     CallHandle, CallbackId, CallbackMessage, CallbackService, Capabilities, DispatchConfig,
//!     DispatchContext, Dispatcher, DrainOutcome, MaterializeOutcome, PipeHandle, UserHandle,
//! };
//! use std::sync::{Arc, Mutex};
//!
//! struct OneMessage(Mutex<Option<CallbackMessage>>);
//!
//! impl CallbackService for OneMessage {
//!     fn poll_next_message(&self, _pipe: PipeHandle) -> Option<CallbackMessage> {
//!         self.0.lock().unwrap().take()
//!     }
//!     fn release_last_message(&self, _pipe: PipeHandle) {}
//!     fn materialize_call_result(
//!         &self,
//!         _pipe: PipeHandle,
//!         _call: CallHandle,
//!         _buffer: &mut [u8],
//!         _callback_id: CallbackId,
//!     ) -> MaterializeOutcome {
//!         MaterializeOutcome::unavailable()
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(OneMessage(Mutex::new(Some(CallbackMessage::new(
//!     UserHandle(1),
//!     CallbackId(304),
//!     vec![0u8; 4],
//! )))));
//! let dispatcher =
//!     Dispatcher::with_capabilities(DispatchConfig::default(), Capabilities::new(service))?;
//!
//! let listener = from_fn(CallbackId(304), 4, DispatchContext::Client, |_payload| Ok(()));
//! dispatcher.register_callback(&listener, CallbackId(304));
//!
//! let outcome = dispatcher.drain(PipeHandle(1), DispatchContext::Client)?;
//! assert_eq!(outcome, DrainOutcome::Completed { messages: 1 });
//!
//! dispatcher.unregister_callback(listener.as_ref());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod boundary;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod global;
pub mod logging;
pub mod registry;
pub mod subscriber;
pub mod types;

pub use boundary::{CallbackService, Capabilities, DispatchSink, MaterializeOutcome};
pub use config::DispatchConfig;
pub use constants::callback_ids;
pub use dispatch::{CallCompleted, Dispatcher, DispatcherStats, DrainOutcome, RouteOutcome};
pub use error::{ConfigurationError, DispatchError, Result, SubscriberError, SubscriberResult};
pub use registry::{CallbackRegistry, PendingCallRegistry};
pub use subscriber::{CallbackBase, CallbackPayload, Subscriber, SubscriberId};
pub use types::{
    CallHandle, CallbackId, CallbackMessage, DispatchContext, PipeHandle, UserHandle,
};
