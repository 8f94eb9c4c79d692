//! Shared buffers between browser callbacks and the orchestration loop.
//!
//! Browser callbacks fire on the automation engine's tasks and must
//! not block, so they only append here. The loop drains each buffer
//! whole under a short lock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::browser::{Dialog, InterceptedRequest, InterceptedResponse};

/// The engine's network and dialog buffers. Cloned into callbacks.
#[derive(Clone, Default)]
pub struct EventBuffers {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    requests: Mutex<VecDeque<InterceptedRequest>>,
    responses: Mutex<VecDeque<InterceptedResponse>>,
    dialogs: Mutex<VecDeque<Dialog>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl EventBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_request(&self, request: InterceptedRequest) {
        lock(&self.inner.requests).push_back(request);
    }

    pub fn push_response(&self, response: InterceptedResponse) {
        lock(&self.inner.responses).push_back(response);
    }

    pub fn push_dialog(&self, dialog: Dialog) {
        lock(&self.inner.dialogs).push_back(dialog);
    }

    /// Take every buffered request.
    pub fn drain_requests(&self) -> VecDeque<InterceptedRequest> {
        std::mem::take(&mut *lock(&self.inner.requests))
    }

    /// Take every buffered response.
    pub fn drain_responses(&self) -> VecDeque<InterceptedResponse> {
        std::mem::take(&mut *lock(&self.inner.responses))
    }

    /// Take every buffered dialog.
    pub fn drain_dialogs(&self) -> VecDeque<Dialog> {
        std::mem::take(&mut *lock(&self.inner.dialogs))
    }

    /// Drop buffered network traffic, resuming held requests so the
    /// closing session is not left with hanging interceptions.
    pub fn clear_network(&self) {
        for request in std::mem::take(&mut *lock(&self.inner.requests)) {
            request.resume(None);
        }
        lock(&self.inner.responses).clear();
    }
}
