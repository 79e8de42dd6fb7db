//! # Registry Infrastructure
//!
//! Subscriber bookkeeping for the dispatcher.
//!
//! ## Available Registries
//!
//! - **CallbackRegistry**: callback id -> insertion-ordered subscribers, for
//!   recurring broadcast notifications
//! - **PendingCallRegistry**: call handle -> subscriber, for one-shot results of
//!   asynchronous calls
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── CallbackRegistry      (id -> [SubscriberId, Weak<dyn Subscriber>] in order)
//! └── PendingCallRegistry   (CallHandle -> SubscriberId, Weak<dyn Subscriber>)
//! ```
//!
//! Both registries hold non-owning references and never keep a lock while a
//! subscriber runs, so subscribers may register or unregister (themselves or
//! others) from inside their own invocation.

pub mod callback_registry;
pub mod pending_call_registry;

pub use callback_registry::{CallbackRegistry, CallbackRegistryStats};
pub use pending_call_registry::PendingCallRegistry;
