//! # Dispatcher
//!
//! Drains every queued message for a pipe, feeding each one to the [`Router`],
//! and owns the registries, the reentrancy guard and the completion
//! subscribers.
//!
//! ## Drain contract
//!
//! - Without bound capabilities a drain is a no-op ([`DrainOutcome::Unavailable`]).
//! - A drain started while another is in progress, on any pipe and from any
//!   caller including a subscriber running inside that pass, returns
//!   [`DrainOutcome::Rejected`] without touching the running pass.
//! - Messages are routed strictly in the order the service yields them, each
//!   one released right after routing.
//! - With fault isolation disabled, a subscriber fault abandons the drain: the
//!   error (or panic) reaches the caller, the message is not released, and the
//!   dispatch state stays running so every later drain is rejected. Treat the
//!   instance as failed, or call [`Dispatcher::reset_dispatch_state`] once the
//!   service side has been dealt with.

use super::completion::{CompletionStats, CompletionSubscriber};
use super::router::{RouteOutcome, Router};
use super::state::DispatchState;
use crate::boundary::{Capabilities, CapabilitySlot};
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::logging::{log_dispatch_operation, log_error, log_registry_operation};
use crate::registry::{CallbackRegistry, PendingCallRegistry};
use crate::subscriber::Subscriber;
use crate::types::{CallHandle, CallbackId, DispatchContext, PipeHandle, UserHandle};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Result of one drain call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue was consumed
    Completed { messages: usize },
    /// No service capabilities are bound
    Unavailable,
    /// Another drain was in progress
    Rejected,
}

#[derive(Debug, Default)]
struct DrainCounters {
    drains_completed: u64,
    drains_rejected: u64,
    drains_unavailable: u64,
    drains_abandoned: u64,
    messages_dispatched: u64,
    messages_delivered: u64,
    messages_unhandled: u64,
    faults_absorbed: u64,
    last_drain_at: Option<DateTime<Utc>>,
}

/// Snapshot of dispatcher activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub drains_completed: u64,
    pub drains_rejected: u64,
    pub drains_unavailable: u64,
    pub drains_abandoned: u64,
    pub messages_dispatched: u64,
    pub messages_delivered: u64,
    pub messages_unhandled: u64,
    pub faults_absorbed: u64,
    pub completions_delivered: u64,
    pub completions_dropped: u64,
    pub completions_failed: u64,
    pub registered_callbacks: usize,
    pub pending_calls: usize,
    pub last_drain_at: Option<DateTime<Utc>>,
}

/// Callback dispatcher and pending call-result registry
pub struct Dispatcher {
    config: DispatchConfig,
    callbacks: Arc<CallbackRegistry>,
    pending: Arc<PendingCallRegistry>,
    state: Arc<DispatchState>,
    capabilities: Arc<CapabilitySlot>,
    router: Router,
    counters: Mutex<DrainCounters>,
    completion_stats: Arc<Mutex<CompletionStats>>,
    completions: [Arc<CompletionSubscriber>; 2],
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks.len())
            .field("pending", &self.pending.len())
            .field("state", &self.state)
            .field("capabilities_bound", &self.capabilities.is_bound())
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::build(DispatchConfig::default())
    }
}

impl Dispatcher {
    /// Create a dispatcher after validating `config`
    pub fn new(config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a dispatcher and bind its capabilities in one step
    pub fn with_capabilities(config: DispatchConfig, capabilities: Capabilities) -> Result<Self> {
        let dispatcher = Self::new(config)?;
        dispatcher.bind_capabilities(capabilities);
        Ok(dispatcher)
    }

    fn build(config: DispatchConfig) -> Self {
        let callbacks = Arc::new(CallbackRegistry::new());
        let pending = Arc::new(PendingCallRegistry::new());
        let state = Arc::new(DispatchState::new());
        let capabilities = Arc::new(CapabilitySlot::new());
        let completion_stats = Arc::new(Mutex::new(CompletionStats::default()));
        let completion_id = config.completion_callback_id();

        let completion = |context| {
            Arc::new(CompletionSubscriber::new(
                completion_id,
                context,
                pending.clone(),
                state.clone(),
                capabilities.clone(),
                completion_stats.clone(),
            ))
        };
        let completions = [
            completion(DispatchContext::Client),
            completion(DispatchContext::GameServer),
        ];
        for subscriber in &completions {
            callbacks.register_permanent(subscriber, completion_id);
            log_registry_operation(
                "register",
                "callbacks",
                Some(subscriber.name()),
                Some(&completion_id.to_string()),
                "permanent",
                None,
            );
        }

        Self {
            router: Router::new(
                callbacks.clone(),
                config.isolate_faults,
                config.log_unhandled_messages,
            ),
            config,
            callbacks,
            pending,
            state,
            capabilities,
            counters: Mutex::new(DrainCounters::default()),
            completion_stats,
            completions,
        }
    }

    /// Bind the external service capabilities, replacing any previous binding
    pub fn bind_capabilities(&self, capabilities: Capabilities) {
        let has_sink = capabilities.sink.is_some();
        let replaced = self.capabilities.bind(capabilities).is_some();
        log_dispatch_operation(
            "bind_capabilities",
            self.state.active_pipe().0,
            "-",
            if replaced { "rebound" } else { "bound" },
            None,
            Some(if has_sink { "with sink" } else { "without sink" }),
        );
    }

    /// Drop the bound capabilities; later drains become no-ops
    pub fn unbind_capabilities(&self) -> bool {
        self.capabilities.unbind().is_some()
    }

    pub fn has_capabilities(&self) -> bool {
        self.capabilities.is_bound()
    }

    pub fn register_callback<S: Subscriber + 'static>(
        &self,
        subscriber: &Arc<S>,
        callback_id: CallbackId,
    ) -> bool {
        self.callbacks.register(subscriber, callback_id)
    }

    /// Unregister a callback subscriber; the built-in completion subscribers
    /// are permanent and are never removed
    pub fn unregister_callback(&self, subscriber: &dyn Subscriber) -> bool {
        self.callbacks.unregister(subscriber)
    }

    pub fn register_call_result<S: Subscriber + 'static>(
        &self,
        subscriber: &Arc<S>,
        call: CallHandle,
    ) -> bool {
        self.pending.register(subscriber, call)
    }

    pub fn unregister_call_result(&self, subscriber: &dyn Subscriber, call: CallHandle) -> bool {
        self.pending.unregister(subscriber, call)
    }

    /// Drain every queued message for `pipe`
    pub fn drain(&self, pipe: PipeHandle, context: DispatchContext) -> Result<DrainOutcome> {
        let Some(capabilities) = self.capabilities.get() else {
            debug!(pipe = %pipe, "Drain skipped: service capabilities not bound");
            self.counters.lock().drains_unavailable += 1;
            return Ok(DrainOutcome::Unavailable);
        };

        if !self.state.try_begin(pipe) {
            debug!(
                pipe = %pipe,
                active_pipe = %self.state.active_pipe(),
                "Drain rejected: dispatch already in progress"
            );
            self.counters.lock().drains_rejected += 1;
            return Ok(DrainOutcome::Rejected);
        }

        let service = capabilities.service.as_ref();
        let sink = capabilities.sink.as_deref();
        let mut messages = 0;

        while let Some(message) = service.poll_next_message(pipe) {
            self.state.set_current_user(message.user);

            let outcome = match self.router.dispatch(&message, context, sink) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.counters.lock().drains_abandoned += 1;
                    log_error(
                        "dispatcher",
                        "drain",
                        &err.to_string(),
                        Some("dispatch state left running; reset required"),
                    );
                    return Err(err);
                }
            };
            service.release_last_message(pipe);
            messages += 1;

            let mut counters = self.counters.lock();
            counters.messages_dispatched += 1;
            match outcome {
                RouteOutcome::Delivered => counters.messages_delivered += 1,
                RouteOutcome::Unhandled => counters.messages_unhandled += 1,
                RouteOutcome::Absorbed => counters.faults_absorbed += 1,
            }
        }

        self.state.finish();

        let mut counters = self.counters.lock();
        counters.drains_completed += 1;
        counters.last_drain_at = Some(Utc::now());
        drop(counters);

        debug!(pipe = %pipe, context = %context, messages = messages, "Drain completed");
        Ok(DrainOutcome::Completed { messages })
    }

    /// Drain with the context given as a game-server flag
    pub fn run_callbacks(&self, pipe: PipeHandle, is_game_server: bool) -> Result<DrainOutcome> {
        self.drain(pipe, DispatchContext::from_game_server(is_game_server))
    }

    /// Originating user of the message being dispatched; null outside a drain
    pub fn current_user_handle(&self) -> UserHandle {
        self.state.current_user()
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    /// Release a dispatch state left running by an abandoned drain
    pub fn reset_dispatch_state(&self) -> bool {
        let was_running = self.state.is_running();
        let pipe = self.state.active_pipe();
        self.state.finish();
        if was_running {
            log_dispatch_operation(
                "reset",
                pipe.0,
                "-",
                "reset",
                None,
                Some("dispatch state released"),
            );
        }
        was_running
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn pending_calls(&self) -> &PendingCallRegistry {
        &self.pending
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Callback id the built-in completion subscribers listen on
    pub fn completion_callback_id(&self) -> CallbackId {
        self.completions[0].base().callback_id()
    }

    pub fn stats(&self) -> DispatcherStats {
        let counters = self.counters.lock();
        let completions = *self.completion_stats.lock();
        DispatcherStats {
            drains_completed: counters.drains_completed,
            drains_rejected: counters.drains_rejected,
            drains_unavailable: counters.drains_unavailable,
            drains_abandoned: counters.drains_abandoned,
            messages_dispatched: counters.messages_dispatched,
            messages_delivered: counters.messages_delivered,
            messages_unhandled: counters.messages_unhandled,
            faults_absorbed: counters.faults_absorbed,
            completions_delivered: completions.delivered,
            completions_dropped: completions.dropped,
            completions_failed: completions.failed,
            registered_callbacks: self.callbacks.len(),
            pending_calls: self.pending.len(),
            last_drain_at: counters.last_drain_at,
        }
    }
}
