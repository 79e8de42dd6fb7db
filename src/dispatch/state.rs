//! Ambient per-pass dispatch state.
//!
//! The reentrancy flag is the only concurrency control in the dispatcher: a
//! drain that finds it set returns immediately instead of waiting.

use crate::types::{PipeHandle, UserHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct PassHandles {
    pipe: PipeHandle,
    user: UserHandle,
}

/// Reentrancy flag, active pipe and current originating user of a drain pass
#[derive(Debug, Default)]
pub struct DispatchState {
    running: AtomicBool,
    handles: Mutex<PassHandles>,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag for a new pass on `pipe`; `false` if a pass is in progress
    pub(crate) fn try_begin(&self, pipe: PipeHandle) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let mut handles = self.handles.lock();
        handles.pipe = pipe;
        handles.user = UserHandle::NULL;
        true
    }

    pub(crate) fn set_current_user(&self, user: UserHandle) {
        self.handles.lock().user = user;
    }

    /// Clear the pass handles and release the flag
    pub(crate) fn finish(&self) {
        *self.handles.lock() = PassHandles::default();
        self.running.store(false, Ordering::Release);
    }

    /// A drain is in progress, or one was abandoned by a propagated fault
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Pipe of the pass in progress, null outside a drain
    pub fn active_pipe(&self) -> PipeHandle {
        self.handles.lock().pipe
    }

    /// Originating user of the message being dispatched, null outside a drain
    pub fn current_user(&self) -> UserHandle {
        self.handles.lock().user
    }
}
