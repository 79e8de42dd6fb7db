//! # Process-wide Dispatch Surface
//!
//! Free functions over a single lazily initialized [`Dispatcher`], for hosts
//! that expose the dispatcher through a flat procedural interface.
//!
//! Every function except [`initialize`] is inert until the dispatcher has been
//! initialized: registrations are ignored, drains report
//! [`DrainOutcome::Unavailable`] and the current user is null.

use crate::boundary::Capabilities;
use crate::config::DispatchConfig;
use crate::dispatch::{Dispatcher, DrainOutcome};
use crate::error::Result;
use crate::subscriber::Subscriber;
use crate::types::{CallHandle, CallbackId, PipeHandle, UserHandle};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

static GLOBAL_DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Initialize the process-wide dispatcher
///
/// The first successful call wins; later calls return the existing instance
/// and ignore their configuration.
pub fn initialize(config: DispatchConfig) -> Result<&'static Dispatcher> {
    if let Some(existing) = GLOBAL_DISPATCHER.get() {
        warn!("Global dispatcher already initialized; ignoring new configuration");
        return Ok(existing);
    }

    let dispatcher = Dispatcher::new(config)?;
    let dispatcher = GLOBAL_DISPATCHER.get_or_init(|| {
        info!("🎯 GLOBAL DISPATCHER: Initialized process-wide dispatcher");
        dispatcher
    });
    Ok(dispatcher)
}

pub fn is_initialized() -> bool {
    GLOBAL_DISPATCHER.get().is_some()
}

/// The process-wide dispatcher, if initialized
pub fn dispatcher() -> Option<&'static Dispatcher> {
    GLOBAL_DISPATCHER.get()
}

fn with_dispatcher<T>(operation: &str, fallback: T, f: impl FnOnce(&'static Dispatcher) -> T) -> T {
    match GLOBAL_DISPATCHER.get() {
        Some(dispatcher) => f(dispatcher),
        None => {
            debug!(operation = operation, "Global dispatcher not initialized; ignoring");
            fallback
        }
    }
}

pub fn register_callback<S: Subscriber + 'static>(
    subscriber: &Arc<S>,
    callback_id: CallbackId,
) -> bool {
    with_dispatcher("register_callback", false, |d| {
        d.register_callback(subscriber, callback_id)
    })
}

pub fn unregister_callback(subscriber: &dyn Subscriber) -> bool {
    with_dispatcher("unregister_callback", false, |d| d.unregister_callback(subscriber))
}

pub fn register_call_result<S: Subscriber + 'static>(
    subscriber: &Arc<S>,
    call: CallHandle,
) -> bool {
    with_dispatcher("register_call_result", false, |d| {
        d.register_call_result(subscriber, call)
    })
}

/// Unregister a call result; no-op unless the handle is actually pending
pub fn unregister_call_result(subscriber: &dyn Subscriber, call: CallHandle) -> bool {
    with_dispatcher("unregister_call_result", false, |d| {
        if !d.pending_calls().contains(call) {
            return false;
        }
        d.unregister_call_result(subscriber, call)
    })
}

pub fn run_callbacks(pipe: PipeHandle, is_game_server: bool) -> Result<DrainOutcome> {
    match GLOBAL_DISPATCHER.get() {
        Some(dispatcher) => dispatcher.run_callbacks(pipe, is_game_server),
        None => Ok(DrainOutcome::Unavailable),
    }
}

pub fn bind_external_capabilities(capabilities: Capabilities) -> bool {
    with_dispatcher("bind_external_capabilities", false, |d| {
        d.bind_capabilities(capabilities);
        true
    })
}

pub fn current_user_handle() -> UserHandle {
    with_dispatcher("current_user_handle", UserHandle::NULL, |d| {
        d.current_user_handle()
    })
}
