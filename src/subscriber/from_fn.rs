use super::{CallbackBase, Subscriber};
use crate::error::SubscriberResult;
use crate::types::{CallHandle, CallbackId, DispatchContext};
use std::sync::Arc;

/// Broadcast subscriber backed by a closure
pub struct FnSubscriber<F> {
    base: CallbackBase,
    f: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&[u8]) -> SubscriberResult + Send + Sync,
{
    #[inline]
    pub fn new(
        callback_id: CallbackId,
        payload_size: usize,
        context: DispatchContext,
        f: F,
    ) -> Self {
        Self {
            base: CallbackBase::new(callback_id, payload_size, context),
            f,
        }
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&[u8]) -> SubscriberResult + Send + Sync,
{
    #[inline]
    fn base(&self) -> &CallbackBase {
        &self.base
    }

    #[inline]
    fn run(&self, payload: &[u8]) -> SubscriberResult {
        (self.f)(payload)
    }
}

#[inline]
pub fn from_fn<F>(
    callback_id: CallbackId,
    payload_size: usize,
    context: DispatchContext,
    f: F,
) -> Arc<FnSubscriber<F>>
where
    F: Fn(&[u8]) -> SubscriberResult + Send + Sync,
{
    Arc::new(FnSubscriber::new(callback_id, payload_size, context, f))
}

/// One-shot call-result subscriber backed by a closure
pub struct FnCallResult<F> {
    base: CallbackBase,
    f: F,
}

impl<F> FnCallResult<F>
where
    F: Fn(&[u8], bool, CallHandle) -> SubscriberResult + Send + Sync,
{
    #[inline]
    pub fn new(callback_id: CallbackId, payload_size: usize, f: F) -> Self {
        Self {
            base: CallbackBase::new(callback_id, payload_size, DispatchContext::Client),
            f,
        }
    }
}

impl<F> Subscriber for FnCallResult<F>
where
    F: Fn(&[u8], bool, CallHandle) -> SubscriberResult + Send + Sync,
{
    #[inline]
    fn base(&self) -> &CallbackBase {
        &self.base
    }

    #[inline]
    fn run(&self, payload: &[u8]) -> SubscriberResult {
        (self.f)(payload, false, CallHandle::INVALID)
    }

    #[inline]
    fn run_call_result(
        &self,
        payload: &[u8],
        io_failed: bool,
        call: CallHandle,
    ) -> SubscriberResult {
        (self.f)(payload, io_failed, call)
    }
}

#[inline]
pub fn call_result_fn<F>(callback_id: CallbackId, payload_size: usize, f: F) -> Arc<FnCallResult<F>>
where
    F: Fn(&[u8], bool, CallHandle) -> SubscriberResult + Send + Sync,
{
    Arc::new(FnCallResult::new(callback_id, payload_size, f))
}
