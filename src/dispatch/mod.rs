//! # Dispatch
//!
//! Drain loop, routing and call-completion handling.
//!
//! ```text
//! Dispatcher::drain(pipe, context)
//! └── loop CallbackService::poll_next_message(pipe)
//!     ├── DispatchState::set_current_user(message.user)
//!     ├── Router::dispatch(message, context, sink)
//!     │   └── first subscriber for (callback_id, context)
//!     │       └── CompletionSubscriber (callback 703)
//!     │           └── PendingCallRegistry::take(call)
//!     │               └── materialize_call_result -> run_call_result
//!     └── CallbackService::release_last_message(pipe)
//! ```

pub mod completion;
pub mod dispatcher;
pub mod router;
pub mod state;

pub use completion::{CallCompleted, CompletionStats, CompletionSubscriber};
pub use dispatcher::{Dispatcher, DispatcherStats, DrainOutcome};
pub use router::{RouteOutcome, Router};
pub use state::DispatchState;
