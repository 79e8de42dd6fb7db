//! # Pending Call Registry
//!
//! One-shot associations between an outstanding asynchronous call and the
//! subscriber waiting for its result. Each live handle maps to exactly one
//! subscriber; the completion flow removes the entry before the first delivery
//! attempt, giving at-most-one delivery per handle.

use crate::subscriber::{Subscriber, SubscriberId};
use crate::types::CallHandle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

struct PendingCall {
    subscriber_id: SubscriberId,
    subscriber: Weak<dyn Subscriber>,
}

/// Registry for subscribers awaiting call results
#[derive(Default)]
pub struct PendingCallRegistry {
    calls: DashMap<CallHandle, PendingCall>,
}

impl std::fmt::Debug for PendingCallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallRegistry")
            .field("pending", &self.calls.len())
            .finish()
    }
}

impl PendingCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `call` with `subscriber`
    ///
    /// Invalid handles are ignored. A handle that is already pending keeps its
    /// first subscriber.
    pub fn register<S: Subscriber + 'static>(&self, subscriber: &Arc<S>, call: CallHandle) -> bool {
        if !call.is_valid() {
            return false;
        }

        match self.calls.entry(call) {
            Entry::Occupied(existing) => {
                warn!(
                    call = %call,
                    subscriber = %subscriber.name(),
                    pending_subscriber = %existing.get().subscriber_id,
                    "Call handle already pending for another registration; keeping the first"
                );
                false
            }
            Entry::Vacant(slot) => {
                let dynamic: Arc<dyn Subscriber> = subscriber.clone();
                subscriber.base().mark_pending();
                slot.insert(PendingCall {
                    subscriber_id: subscriber.base().id(),
                    subscriber: Arc::downgrade(&dynamic),
                });
                debug!(call = %call, subscriber = %subscriber.name(), "Registered call result");
                true
            }
        }
    }

    /// Drop the association for `call`
    ///
    /// No-op for an invalid handle, an unregistered subscriber, or an empty
    /// registry. Removal is keyed by handle alone.
    pub fn unregister(&self, subscriber: &dyn Subscriber, call: CallHandle) -> bool {
        if !call.is_valid() || !subscriber.base().is_registered() || self.calls.is_empty() {
            return false;
        }

        let Some((_, pending)) = self.calls.remove(&call) else {
            return false;
        };
        if let Some(owner) = pending.subscriber.upgrade() {
            owner.base().release_pending();
        }
        debug!(call = %call, subscriber = %subscriber.name(), "Unregistered call result");
        true
    }

    /// Remove `call` unconditionally, returning its subscriber if still alive
    pub(crate) fn take(&self, call: CallHandle) -> Option<Arc<dyn Subscriber>> {
        let (_, pending) = self.calls.remove(&call)?;
        let subscriber = pending.subscriber.upgrade();
        if let Some(owner) = &subscriber {
            owner.base().release_pending();
        } else {
            debug!(
                call = %call,
                subscriber_id = %pending.subscriber_id,
                "Pending call subscriber was dropped before completion"
            );
        }
        subscriber
    }

    pub fn contains(&self, call: CallHandle) -> bool {
        self.calls.contains_key(&call)
    }

    /// Identity of the subscriber waiting on `call`
    pub fn subscriber_for(&self, call: CallHandle) -> Option<SubscriberId> {
        self.calls.get(&call).map(|pending| pending.subscriber_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Pending handles, ascending
    pub fn handles(&self) -> Vec<CallHandle> {
        let mut handles: Vec<CallHandle> = self.calls.iter().map(|entry| *entry.key()).collect();
        handles.sort_by_key(|call| call.0);
        handles
    }
}
