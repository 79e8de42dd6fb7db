//! # Router
//!
//! Routes one drained message to at most one subscriber.
//!
//! Selection scans the entries registered for the message's callback id in
//! insertion order and picks the first whose context matches the drain's. The
//! chosen subscriber is cloned out of the registry before it runs, so it may
//! unregister itself or any other subscriber without disturbing the scan.
//!
//! ## Fault boundary
//!
//! With isolation enabled, an `Err` returned by the subscriber and a panic
//! raised while selecting or invoking it are both captured and logged. The
//! secondary sink is still notified and the drain moves on. With isolation
//! disabled the fault reaches the drain caller and the sink is skipped for that
//! message.

use crate::boundary::DispatchSink;
use crate::error::{DispatchError, SubscriberError};
use crate::registry::CallbackRegistry;
use crate::types::{CallbackMessage, DispatchContext};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// What happened to a routed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A subscriber ran to completion
    Delivered,
    /// No subscriber matched the id and context
    Unhandled,
    /// A subscriber faulted and the fault was absorbed
    Absorbed,
}

impl RouteOutcome {
    /// Whether a subscriber was selected for the message
    pub fn handled(self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}

struct SubscriberFault {
    subscriber: String,
    source: SubscriberError,
}

/// Message router over a callback registry
#[derive(Debug)]
pub struct Router {
    callbacks: Arc<CallbackRegistry>,
    isolate_faults: bool,
    log_unhandled: bool,
}

impl Router {
    pub fn new(
        callbacks: Arc<CallbackRegistry>,
        isolate_faults: bool,
        log_unhandled: bool,
    ) -> Self {
        Self {
            callbacks,
            isolate_faults,
            log_unhandled,
        }
    }

    pub fn isolates_faults(&self) -> bool {
        self.isolate_faults
    }

    /// Route `message` in `context`, then notify `sink`
    pub fn dispatch(
        &self,
        message: &CallbackMessage,
        context: DispatchContext,
        sink: Option<&dyn DispatchSink>,
    ) -> Result<RouteOutcome, DispatchError> {
        if self.isolate_faults {
            Ok(self.dispatch_isolated(message, context, sink))
        } else {
            self.dispatch_unisolated(message, context, sink)
        }
    }

    fn dispatch_isolated(
        &self,
        message: &CallbackMessage,
        context: DispatchContext,
        sink: Option<&dyn DispatchSink>,
    ) -> RouteOutcome {
        let mut handled = false;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.deliver(message, context, &mut handled)
        }));

        let outcome = match result {
            Ok(Ok(())) if handled => RouteOutcome::Delivered,
            Ok(Ok(())) => {
                self.note_unhandled(message, context);
                RouteOutcome::Unhandled
            }
            Ok(Err(fault)) => {
                error!(
                    callback_id = %message.callback_id,
                    context = %context,
                    subscriber = %fault.subscriber,
                    error = %fault.source,
                    "Subscriber returned error; fault absorbed"
                );
                RouteOutcome::Absorbed
            }
            Err(panic_payload) => {
                error!(
                    callback_id = %message.callback_id,
                    context = %context,
                    handled = handled,
                    panic_msg = %panic_message(panic_payload.as_ref()),
                    "Subscriber panicked; fault absorbed"
                );
                if handled {
                    RouteOutcome::Absorbed
                } else {
                    RouteOutcome::Unhandled
                }
            }
        };

        if let Some(sink) = sink {
            if let Err(panic_payload) =
                panic::catch_unwind(AssertUnwindSafe(|| sink.on_dispatched(message, handled)))
            {
                error!(
                    callback_id = %message.callback_id,
                    panic_msg = %panic_message(panic_payload.as_ref()),
                    "Dispatch sink panicked; fault absorbed"
                );
            }
        }

        #[cfg(feature = "diagnostic-trap")]
        if outcome == RouteOutcome::Absorbed {
            panic!(
                "diagnostic trap: subscriber fault while dispatching callback {}",
                message.callback_id
            );
        }

        outcome
    }

    fn dispatch_unisolated(
        &self,
        message: &CallbackMessage,
        context: DispatchContext,
        sink: Option<&dyn DispatchSink>,
    ) -> Result<RouteOutcome, DispatchError> {
        let mut handled = false;
        self.deliver(message, context, &mut handled)
            .map_err(|fault| DispatchError::SubscriberFault {
                callback_id: message.callback_id,
                subscriber: fault.subscriber,
                source: fault.source,
            })?;

        if !handled {
            self.note_unhandled(message, context);
        }
        if let Some(sink) = sink {
            sink.on_dispatched(message, handled);
        }

        Ok(if handled {
            RouteOutcome::Delivered
        } else {
            RouteOutcome::Unhandled
        })
    }

    fn deliver(
        &self,
        message: &CallbackMessage,
        context: DispatchContext,
        handled: &mut bool,
    ) -> Result<(), SubscriberFault> {
        let Some(subscriber) = self.callbacks.select(message.callback_id, context) else {
            return Ok(());
        };
        *handled = true;

        subscriber
            .run(&message.payload)
            .map_err(|source| SubscriberFault {
                subscriber: subscriber.name().to_string(),
                source,
            })
    }

    fn note_unhandled(&self, message: &CallbackMessage, context: DispatchContext) {
        if self.log_unhandled {
            debug!(
                callback_id = %message.callback_id,
                context = %context,
                payload_len = message.payload.len(),
                "No subscriber for callback"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
