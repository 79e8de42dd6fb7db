//! Shared fakes for dispatcher integration tests
//!
//! `FakeService` stands in for the external handle-based service: it serves a
//! queue of messages per pipe, records every boundary call, and materializes
//! call results from a table configured by the test.

#![allow(dead_code)]

pub mod strategies;

use callback_dispatch::subscriber::CallbackBase;
use callback_dispatch::{
    CallCompleted, CallHandle, CallbackId, CallbackMessage, CallbackPayload, CallbackService,
    Capabilities, DispatchConfig, DispatchContext, DispatchSink, Dispatcher, DrainOutcome,
    MaterializeOutcome, PipeHandle, Subscriber, SubscriberError, SubscriberResult, UserHandle,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};

/// Boundary calls observed by the fake service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Poll(PipeHandle),
    Release(PipeHandle),
    Materialize {
        pipe: PipeHandle,
        call: CallHandle,
        size: usize,
        callback_id: CallbackId,
    },
}

/// Configured result for one call handle
#[derive(Debug, Clone)]
pub struct CallResultFixture {
    pub outcome: MaterializeOutcome,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FakeServiceState {
    pub queues: HashMap<PipeHandle, VecDeque<CallbackMessage>>,
    pub results: HashMap<CallHandle, CallResultFixture>,
    pub calls: Vec<ServiceCall>,
}

/// In-memory stand-in for the external service
#[derive(Debug, Default)]
pub struct FakeService {
    state: Mutex<FakeServiceState>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, pipe: PipeHandle, message: CallbackMessage) {
        self.state
            .lock()
            .unwrap()
            .queues
            .entry(pipe)
            .or_default()
            .push_back(message);
    }

    pub fn push_callback(&self, pipe: PipeHandle, user: i32, callback_id: i32, payload: &[u8]) {
        self.push(
            pipe,
            CallbackMessage::new(UserHandle(user), CallbackId(callback_id), payload.to_vec()),
        );
    }

    /// Queue a call-completed notification for `call`
    pub fn push_completion(&self, pipe: PipeHandle, user: i32, call: u64, result_id: i32) {
        let completed = CallCompleted {
            call: CallHandle(call),
            callback_id: CallbackId(result_id),
            payload_size: 0,
        };
        self.push(
            pipe,
            CallbackMessage::new(UserHandle(user), CallCompleted::CALLBACK_ID, completed.encode()),
        );
    }

    pub fn set_result(&self, call: u64, outcome: MaterializeOutcome, bytes: &[u8]) {
        self.state.lock().unwrap().results.insert(
            CallHandle(call),
            CallResultFixture {
                outcome,
                bytes: bytes.to_vec(),
            },
        );
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn release_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ServiceCall::Release(_)))
            .count()
    }

    pub fn materialize_requests(&self) -> Vec<ServiceCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ServiceCall::Materialize { .. }))
            .collect()
    }

    pub fn queued(&self, pipe: PipeHandle) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(&pipe)
            .map_or(0, VecDeque::len)
    }
}

impl CallbackService for FakeService {
    fn poll_next_message(&self, pipe: PipeHandle) -> Option<CallbackMessage> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ServiceCall::Poll(pipe));
        state.queues.get_mut(&pipe).and_then(VecDeque::pop_front)
    }

    fn release_last_message(&self, pipe: PipeHandle) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(ServiceCall::Release(pipe));
    }

    fn materialize_call_result(
        &self,
        pipe: PipeHandle,
        call: CallHandle,
        buffer: &mut [u8],
        callback_id: CallbackId,
    ) -> MaterializeOutcome {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ServiceCall::Materialize {
            pipe,
            call,
            size: buffer.len(),
            callback_id,
        });
        match state.results.get(&call) {
            Some(fixture) => {
                if fixture.outcome.ok {
                    let len = fixture.bytes.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&fixture.bytes[..len]);
                }
                fixture.outcome
            }
            None => MaterializeOutcome::unavailable(),
        }
    }
}

/// Sink recording `(callback_id, handled)` for every routed message
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<(CallbackId, bool)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<(CallbackId, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

impl DispatchSink for RecordingSink {
    fn on_dispatched(&self, message: &CallbackMessage, handled: bool) {
        self.seen
            .lock()
            .unwrap()
            .push((message.callback_id, handled));
    }
}

/// What a recording subscriber does when invoked, after recording the call
#[derive(Clone)]
pub enum Reaction {
    Nothing,
    Fail,
    Panic,
    UnregisterSelf,
    Unregister(Weak<dyn Subscriber>),
    CancelCall(Weak<dyn Subscriber>, CallHandle),
    DrainAgain(PipeHandle, DispatchContext),
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub payload: Vec<u8>,
    pub io_failed: Option<bool>,
    pub call: Option<CallHandle>,
    pub user: UserHandle,
}

/// Subscriber that records every invocation and optionally reacts
pub struct RecordingSubscriber {
    base: CallbackBase,
    name: String,
    dispatcher: Mutex<Weak<Dispatcher>>,
    reaction: Mutex<Reaction>,
    invocations: Mutex<Vec<Invocation>>,
    nested_drains: Mutex<Vec<callback_dispatch::Result<DrainOutcome>>>,
}

impl RecordingSubscriber {
    pub fn new(
        name: &str,
        callback_id: i32,
        payload_size: usize,
        context: DispatchContext,
    ) -> Arc<Self> {
        Arc::new(Self {
            base: CallbackBase::new(CallbackId(callback_id), payload_size, context),
            name: name.to_string(),
            dispatcher: Mutex::new(Weak::new()),
            reaction: Mutex::new(Reaction::Nothing),
            invocations: Mutex::new(Vec::new()),
            nested_drains: Mutex::new(Vec::new()),
        })
    }

    pub fn client(name: &str, callback_id: i32) -> Arc<Self> {
        Self::new(name, callback_id, 0, DispatchContext::Client)
    }

    pub fn server(name: &str, callback_id: i32) -> Arc<Self> {
        Self::new(name, callback_id, 0, DispatchContext::GameServer)
    }

    /// Attach the dispatcher used by reactions and for current-user capture
    pub fn attach(&self, dispatcher: &Arc<Dispatcher>) {
        *self.dispatcher.lock().unwrap() = Arc::downgrade(dispatcher);
    }

    pub fn react(&self, reaction: Reaction) {
        *self.reaction.lock().unwrap() = reaction;
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Outcomes of drains started from inside this subscriber
    pub fn nested_drain_outcomes(&self) -> Vec<DrainOutcome> {
        self.nested_drains
            .lock()
            .unwrap()
            .iter()
            .filter_map(|result| result.as_ref().ok().copied())
            .collect()
    }

    fn handle(&self, invocation: Invocation) -> SubscriberResult {
        self.invocations.lock().unwrap().push(invocation);
        let dispatcher = self.dispatcher.lock().unwrap().upgrade();

        // Unregistration and cancellation reactions fire once
        let reaction = {
            let mut slot = self.reaction.lock().unwrap();
            let current = slot.clone();
            if matches!(
                current,
                Reaction::UnregisterSelf | Reaction::Unregister(_) | Reaction::CancelCall(..)
            ) {
                *slot = Reaction::Nothing;
            }
            current
        };

        match reaction {
            Reaction::Nothing => Ok(()),
            Reaction::Fail => Err(SubscriberError::failed(&self.name, "configured failure")),
            Reaction::Panic => panic!("{} configured to panic", self.name),
            Reaction::UnregisterSelf => {
                if let Some(dispatcher) = &dispatcher {
                    dispatcher.unregister_callback(self);
                }
                Ok(())
            }
            Reaction::Unregister(other) => {
                if let (Some(dispatcher), Some(other)) = (&dispatcher, other.upgrade()) {
                    dispatcher.unregister_callback(other.as_ref());
                }
                Ok(())
            }
            Reaction::CancelCall(waiter, call) => {
                if let (Some(dispatcher), Some(waiter)) = (&dispatcher, waiter.upgrade()) {
                    dispatcher.unregister_call_result(waiter.as_ref(), call);
                }
                Ok(())
            }
            Reaction::DrainAgain(pipe, context) => {
                if let Some(dispatcher) = &dispatcher {
                    let outcome = dispatcher.drain(pipe, context);
                    self.nested_drains.lock().unwrap().push(outcome);
                }
                Ok(())
            }
        }
    }

    fn current_user(&self) -> UserHandle {
        self.dispatcher
            .lock()
            .unwrap()
            .upgrade()
            .map_or(UserHandle::NULL, |d| d.current_user_handle())
    }
}

impl Subscriber for RecordingSubscriber {
    fn base(&self) -> &CallbackBase {
        &self.base
    }

    fn run(&self, payload: &[u8]) -> SubscriberResult {
        let user = self.current_user();
        self.handle(Invocation {
            payload: payload.to_vec(),
            io_failed: None,
            call: None,
            user,
        })
    }

    fn run_call_result(
        &self,
        payload: &[u8],
        io_failed: bool,
        call: CallHandle,
    ) -> SubscriberResult {
        let user = self.current_user();
        self.handle(Invocation {
            payload: payload.to_vec(),
            io_failed: Some(io_failed),
            call: Some(call),
            user,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub const PIPE: PipeHandle = PipeHandle(1);

pub type Harness = (Arc<Dispatcher>, Arc<FakeService>, Arc<RecordingSink>);

/// Dispatcher bound to a fresh fake service and recording sink
pub fn dispatcher_with(config: DispatchConfig) -> Harness {
    let service = FakeService::new();
    let sink = RecordingSink::new();
    let dispatcher = Dispatcher::with_capabilities(
        config,
        Capabilities::new(service.clone()).with_sink(sink.clone()),
    )
    .expect("default-derived config is valid");
    (Arc::new(dispatcher), service, sink)
}

pub fn isolated_dispatcher() -> Harness {
    dispatcher_with(DispatchConfig::default())
}

pub fn unisolated_dispatcher() -> Harness {
    dispatcher_with(DispatchConfig::default().with_fault_isolation(false))
}
