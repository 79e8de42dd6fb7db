//! # Callback Registry
//!
//! Registry of broadcast subscribers keyed by callback id.
//!
//! ## Key Features
//!
//! - **Duplicate ids**: any number of subscribers may listen for the same id
//! - **Insertion order**: the earliest registration wins selection ties
//! - **Identity-based removal** by [`SubscriberId`], never by pointer
//! - **Scan safety**: selection clones the chosen subscriber out before it runs,
//!   so unregistration from inside an invocation never invalidates a live borrow
//!
//! ## Usage
//!
//! ```rust
//! use callback_dispatch::registry::CallbackRegistry;
//! use callback_dispatch::subscriber::from_fn;
//! use callback_dispatch::{CallbackId, DispatchContext};
//!
//! let registry = CallbackRegistry::new();
//! let listener = from_fn(CallbackId(5), 0, DispatchContext::Client, |_| Ok(()));
//!
//! assert!(registry.register(&listener, CallbackId(5)));
//! assert!(registry.select(CallbackId(5), DispatchContext::Client).is_some());
//! assert!(registry.unregister(listener.as_ref()));
//! assert!(registry.is_empty());
//! ```

use crate::subscriber::{Subscriber, SubscriberId};
use crate::types::{CallbackId, DispatchContext};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

struct CallbackEntry {
    subscriber_id: SubscriberId,
    subscriber: Weak<dyn Subscriber>,
}

impl std::fmt::Debug for CallbackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("subscriber_id", &self.subscriber_id)
            .field("subscriber", &"<Weak<dyn Subscriber>>".to_string())
            .finish()
    }
}

/// Registry for broadcast subscribers
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: RwLock<HashMap<CallbackId, Vec<CallbackEntry>>>,
    /// Subscribers that `unregister` refuses to remove
    permanent: RwLock<HashSet<SubscriberId>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `callback_id`
    ///
    /// Returns `false` without changes when the subscriber is already present for
    /// that id, or when it is still registered under a different id.
    pub fn register<S: Subscriber + 'static>(
        &self,
        subscriber: &Arc<S>,
        callback_id: CallbackId,
    ) -> bool {
        let base = subscriber.base();
        let subscriber_id = base.id();
        let mut entries = self.entries.write();

        if entries
            .get(&callback_id)
            .is_some_and(|list| list.iter().any(|entry| entry.subscriber_id == subscriber_id))
        {
            debug!(
                subscriber = %subscriber.name(),
                callback_id = %callback_id,
                "Subscriber already registered for callback id"
            );
            return false;
        }

        if base.holds_callback() && base.callback_id() != callback_id {
            warn!(
                subscriber = %subscriber.name(),
                registered_for = %base.callback_id(),
                requested = %callback_id,
                "Subscriber is still registered under another callback id; ignoring registration"
            );
            return false;
        }

        let dynamic: Arc<dyn Subscriber> = subscriber.clone();
        base.mark_registered(callback_id);
        entries.entry(callback_id).or_default().push(CallbackEntry {
            subscriber_id,
            subscriber: Arc::downgrade(&dynamic),
        });

        debug!(
            subscriber = %subscriber.name(),
            callback_id = %callback_id,
            context = %base.context(),
            "Registered callback subscriber"
        );
        true
    }

    /// Register a subscriber that stays registered for the registry's lifetime
    pub(crate) fn register_permanent<S: Subscriber + 'static>(
        &self,
        subscriber: &Arc<S>,
        callback_id: CallbackId,
    ) -> bool {
        let registered = self.register(subscriber, callback_id);
        if registered {
            self.permanent.write().insert(subscriber.base().id());
        }
        registered
    }

    /// Whether `subscriber_id` was registered as permanent
    pub fn is_permanent(&self, subscriber_id: SubscriberId) -> bool {
        self.permanent.read().contains(&subscriber_id)
    }

    /// Unregister a subscriber from the id it is registered under
    ///
    /// The registered flag is cleared before the entry is removed, so calling this
    /// again (including from inside the subscriber's own invocation) is a no-op.
    /// Permanent subscribers are never removed.
    pub fn unregister(&self, subscriber: &dyn Subscriber) -> bool {
        let base = subscriber.base();
        if self.is_permanent(base.id()) {
            warn!(
                subscriber = %subscriber.name(),
                callback_id = %base.callback_id(),
                "Refusing to unregister a permanent subscriber"
            );
            return false;
        }
        if !base.clear_registered() {
            return false;
        }

        let callback_id = base.callback_id();
        let subscriber_id = base.id();
        let mut entries = self.entries.write();

        let Some(list) = entries.get_mut(&callback_id) else {
            return false;
        };
        let Some(position) = list
            .iter()
            .position(|entry| entry.subscriber_id == subscriber_id)
        else {
            return false;
        };

        list.remove(position);
        if list.is_empty() {
            entries.remove(&callback_id);
        }

        debug!(
            subscriber = %subscriber.name(),
            callback_id = %callback_id,
            "Unregistered callback subscriber"
        );
        true
    }

    /// Select the earliest-registered live subscriber for `callback_id` whose
    /// context matches
    pub fn select(
        &self,
        callback_id: CallbackId,
        context: DispatchContext,
    ) -> Option<Arc<dyn Subscriber>> {
        let mut found_dead = false;
        let selected = {
            let entries = self.entries.read();
            let list = entries.get(&callback_id)?;
            let mut selected = None;
            for entry in list {
                let Some(subscriber) = entry.subscriber.upgrade() else {
                    found_dead = true;
                    continue;
                };
                let base = subscriber.base();
                if base.holds_callback() && base.context() == context {
                    selected = Some(subscriber);
                    break;
                }
            }
            selected
        };

        if found_dead {
            self.prune_dropped(callback_id);
        }
        selected
    }

    /// Remove entries whose subscriber was dropped without unregistering
    fn prune_dropped(&self, callback_id: CallbackId) {
        let mut entries = self.entries.write();
        let Some(list) = entries.get_mut(&callback_id) else {
            return;
        };
        let before = list.len();
        list.retain(|entry| entry.subscriber.strong_count() > 0);
        let pruned = before - list.len();
        if list.is_empty() {
            entries.remove(&callback_id);
        }
        if pruned > 0 {
            warn!(
                callback_id = %callback_id,
                pruned = pruned,
                "Pruned subscribers dropped without unregistering"
            );
        }
    }

    pub fn contains(&self, callback_id: CallbackId, subscriber_id: SubscriberId) -> bool {
        self.entries
            .read()
            .get(&callback_id)
            .is_some_and(|list| list.iter().any(|entry| entry.subscriber_id == subscriber_id))
    }

    /// Number of entries registered for one id
    pub fn subscriber_count(&self, callback_id: CallbackId) -> usize {
        self.entries.read().get(&callback_id).map_or(0, Vec::len)
    }

    /// Subscriber identities for one id, in selection order
    pub fn subscribers_for(&self, callback_id: CallbackId) -> Vec<SubscriberId> {
        self.entries
            .read()
            .get(&callback_id)
            .map(|list| list.iter().map(|entry| entry.subscriber_id).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids with at least one entry, ascending
    pub fn callback_ids(&self) -> Vec<CallbackId> {
        let mut ids: Vec<CallbackId> = self.entries.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> CallbackRegistryStats {
        let entries = self.entries.read();
        CallbackRegistryStats {
            total_entries: entries.values().map(Vec::len).sum(),
            distinct_callback_ids: entries.len(),
            dropped_entries: entries
                .values()
                .flatten()
                .filter(|entry| entry.subscriber.strong_count() == 0)
                .count(),
        }
    }
}

/// Statistics about registered callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRegistryStats {
    pub total_entries: usize,
    pub distinct_callback_ids: usize,
    /// Entries whose subscriber is gone but not yet pruned
    pub dropped_entries: usize,
}
