//! # Call Completion Flow
//!
//! The dispatcher owns two [`CompletionSubscriber`]s, one per context, that stay
//! registered for the "asynchronous call completed" callback id. When one fires
//! it resolves the call handle against the pending registry, has the service
//! materialize the result, and hands it to the waiting subscriber.

use crate::boundary::CapabilitySlot;
use crate::constants::{callback_ids, CALL_COMPLETED_PAYLOAD_SIZE};
use crate::error::{SubscriberError, SubscriberResult};
use crate::registry::PendingCallRegistry;
use crate::subscriber::{CallbackBase, CallbackPayload, Subscriber};
use crate::types::{CallHandle, CallbackId, DispatchContext};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::state::DispatchState;

/// Payload of the call-completed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallCompleted {
    pub call: CallHandle,
    /// Callback id of the result type the call produced
    pub callback_id: CallbackId,
    /// Byte size of the result as reported by the service
    pub payload_size: u32,
}

impl CallbackPayload for CallCompleted {
    const CALLBACK_ID: CallbackId = callback_ids::CALL_COMPLETED;
    const SIZE: usize = CALL_COMPLETED_PAYLOAD_SIZE;

    fn decode(bytes: &[u8]) -> Result<Self, SubscriberError> {
        Self::ensure_size(bytes)?;
        let mut call = [0u8; 8];
        let mut callback_id = [0u8; 4];
        let mut payload_size = [0u8; 4];
        call.copy_from_slice(&bytes[0..8]);
        callback_id.copy_from_slice(&bytes[8..12]);
        payload_size.copy_from_slice(&bytes[12..16]);

        Ok(Self {
            call: CallHandle(u64::from_le_bytes(call)),
            callback_id: CallbackId(i32::from_le_bytes(callback_id)),
            payload_size: u32::from_le_bytes(payload_size),
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.call.0.to_le_bytes());
        bytes.extend_from_slice(&self.callback_id.0.to_le_bytes());
        bytes.extend_from_slice(&self.payload_size.to_le_bytes());
        bytes
    }
}

/// Counters kept by the completion subscribers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionStats {
    /// Results their subscriber accepted without error
    pub delivered: u64,
    /// Completions for handles nobody was waiting on
    pub dropped: u64,
    /// Completions whose result could not be materialized
    pub failed: u64,
}

/// Built-in subscriber turning call-completed notifications into result delivery
pub struct CompletionSubscriber {
    base: CallbackBase,
    pending: Arc<PendingCallRegistry>,
    state: Arc<DispatchState>,
    capabilities: Arc<CapabilitySlot>,
    stats: Arc<Mutex<CompletionStats>>,
}

impl CompletionSubscriber {
    pub(crate) fn new(
        callback_id: CallbackId,
        context: DispatchContext,
        pending: Arc<PendingCallRegistry>,
        state: Arc<DispatchState>,
        capabilities: Arc<CapabilitySlot>,
        stats: Arc<Mutex<CompletionStats>>,
    ) -> Self {
        Self {
            base: CallbackBase::new(callback_id, CallCompleted::SIZE, context),
            pending,
            state,
            capabilities,
            stats,
        }
    }

    fn complete(&self, completed: CallCompleted) -> SubscriberResult {
        let call = completed.call;

        // Removing before materialization bounds delivery to one attempt per handle
        let Some(target) = self.pending.take(call) else {
            debug!(call = %call, "Completion for unknown or abandoned call; dropping");
            self.stats.lock().dropped += 1;
            return Ok(());
        };

        let Some(capabilities) = self.capabilities.get() else {
            warn!(call = %call, "Call completed without bound service capabilities");
            self.stats.lock().failed += 1;
            return Ok(());
        };

        let target_base = target.base();
        let mut buffer = vec![0u8; target_base.payload_size()];
        let outcome = capabilities.service.materialize_call_result(
            self.state.active_pipe(),
            call,
            &mut buffer,
            target_base.callback_id(),
        );

        if !outcome.ok {
            debug!(
                call = %call,
                subscriber = %target.name(),
                expected_callback_id = %target_base.callback_id(),
                reported_callback_id = %completed.callback_id,
                "Call result could not be materialized"
            );
            self.stats.lock().failed += 1;
            return Ok(());
        }

        target.run_call_result(&buffer, outcome.io_failed, call)?;
        self.stats.lock().delivered += 1;
        Ok(())
    }
}

impl Subscriber for CompletionSubscriber {
    fn base(&self) -> &CallbackBase {
        &self.base
    }

    fn run(&self, payload: &[u8]) -> SubscriberResult {
        let completed = CallCompleted::decode(payload)?;
        self.complete(completed)
    }

    fn name(&self) -> &str {
        match self.base.context() {
            DispatchContext::Client => "call_completed_client",
            DispatchContext::GameServer => "call_completed_game_server",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{CallbackService, Capabilities, MaterializeOutcome};
    use crate::subscriber::call_result_fn;
    use crate::types::{CallbackMessage, PipeHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedResultService {
        outcome: MaterializeOutcome,
        fill: u8,
        requests: AtomicUsize,
    }

    impl CallbackService for FixedResultService {
        fn poll_next_message(&self, _pipe: PipeHandle) -> Option<CallbackMessage> {
            None
        }

        fn release_last_message(&self, _pipe: PipeHandle) {}

        fn materialize_call_result(
            &self,
            _pipe: PipeHandle,
            _call: CallHandle,
            buffer: &mut [u8],
            _callback_id: CallbackId,
        ) -> MaterializeOutcome {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.outcome.ok {
                buffer.fill(self.fill);
            }
            self.outcome
        }
    }

    struct Harness {
        subscriber: CompletionSubscriber,
        pending: Arc<PendingCallRegistry>,
        service: Arc<FixedResultService>,
        stats: Arc<Mutex<CompletionStats>>,
    }

    fn harness(outcome: MaterializeOutcome) -> Harness {
        let pending = Arc::new(PendingCallRegistry::new());
        let capabilities = Arc::new(CapabilitySlot::new());
        let service = Arc::new(FixedResultService {
            outcome,
            fill: 0xAB,
            requests: AtomicUsize::new(0),
        });
        capabilities.bind(Capabilities::new(service.clone()));
        let stats = Arc::new(Mutex::new(CompletionStats::default()));
        let subscriber = CompletionSubscriber::new(
            callback_ids::CALL_COMPLETED,
            DispatchContext::Client,
            pending.clone(),
            Arc::new(DispatchState::new()),
            capabilities,
            stats.clone(),
        );
        Harness {
            subscriber,
            pending,
            service,
            stats,
        }
    }

    fn completion_payload(call: u64) -> Vec<u8> {
        CallCompleted {
            call: CallHandle(call),
            callback_id: CallbackId(1101),
            payload_size: 16,
        }
        .encode()
    }

    #[test]
    fn test_payload_layout() {
        let completed = CallCompleted {
            call: CallHandle(0x0102030405060708),
            callback_id: CallbackId(1101),
            payload_size: 24,
        };
        let bytes = completed.encode();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 0x08);
        assert_eq!(CallCompleted::decode(&bytes).unwrap(), completed);
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let err = CallCompleted::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            SubscriberError::MalformedPayload {
                expected: 16,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_successful_completion_delivers_materialized_bytes() {
        let h = harness(MaterializeOutcome::success());
        let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let target = call_result_fn(CallbackId(1101), 16, move |payload, io_failed, call| {
            assert!(!io_failed);
            assert_eq!(call, CallHandle(42));
            received_clone.lock().extend_from_slice(payload);
            Ok(())
        });
        h.pending.register(&target, CallHandle(42));

        h.subscriber.run(&completion_payload(42)).unwrap();

        assert_eq!(*received.lock(), vec![0xAB; 16]);
        assert!(!h.pending.contains(CallHandle(42)));
        assert_eq!(h.stats.lock().delivered, 1);
    }

    #[test]
    fn test_failed_materialization_removes_handle_without_invoking() {
        let h = harness(MaterializeOutcome::unavailable());
        let target = call_result_fn(CallbackId(1101), 16, |_, _, _| {
            panic!("must not be invoked");
        });
        h.pending.register(&target, CallHandle(42));

        h.subscriber.run(&completion_payload(42)).unwrap();

        assert!(!h.pending.contains(CallHandle(42)));
        assert_eq!(h.stats.lock().failed, 1);

        // Second completion for the same handle is a silent drop
        h.subscriber.run(&completion_payload(42)).unwrap();
        assert_eq!(h.service.requests.load(Ordering::SeqCst), 1);
        assert_eq!(h.stats.lock().dropped, 1);
    }

    #[test]
    fn test_unknown_handle_is_dropped() {
        let h = harness(MaterializeOutcome::success());
        h.subscriber.run(&completion_payload(99)).unwrap();

        assert_eq!(h.service.requests.load(Ordering::SeqCst), 0);
        assert_eq!(h.stats.lock().dropped, 1);
    }

    #[test]
    fn test_subscriber_error_propagates_after_removal() {
        let h = harness(MaterializeOutcome::io_failure());
        let target = call_result_fn(CallbackId(1101), 16, |_, io_failed, _| {
            assert!(io_failed);
            Err(SubscriberError::failed("target", "rejected result"))
        });
        h.pending.register(&target, CallHandle(5));

        assert!(h.subscriber.run(&completion_payload(5)).is_err());
        assert!(!h.pending.contains(CallHandle(5)));
        assert_eq!(*h.stats.lock(), CompletionStats::default());
    }
}
