//! Request capture and replay across browser-session rotations.
//!
//! Long runs rotate the browser session periodically so that one
//! session never accumulates enough history to be throttled. The new
//! session must resume pagination where the old one stopped; this is
//! done by capturing the old session's next API request, letting the
//! fresh page issue its own first API request, and rewriting that
//! request with the captured URL and headers.

use crate::traits::browser::{RequestOverrides, RequestSnapshot};

/// Where the current graft cycle stands.
///
/// The captured URL and headers always travel together; there is no
/// state in which one is set without the other.
#[derive(Debug, Clone, Default)]
pub enum GraftState {
    /// No graft in progress.
    #[default]
    Idle,
    /// Waiting for the next API request to capture.
    Capturing,
    /// Captured; the next API request is rewritten with this.
    Replaying(RequestSnapshot),
}

/// What the engine should do with the API request it just saw.
#[derive(Debug)]
pub enum GraftAction {
    /// Not grafting; handle the request normally.
    PassThrough,
    /// Abort this request; its parameters have been captured.
    AbortCaptured,
    /// Resume this request with the captured overrides, then restart
    /// the browser session.
    Replay(RequestOverrides),
}

impl GraftState {
    /// Begin a graft cycle. The next matched API request is captured.
    pub fn begin(&mut self) {
        *self = GraftState::Capturing;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, GraftState::Idle)
    }

    /// Advance the cycle with a matched API request.
    pub fn on_request(&mut self, request: &RequestSnapshot) -> GraftAction {
        match std::mem::take(self) {
            GraftState::Idle => GraftAction::PassThrough,
            GraftState::Capturing => {
                *self = GraftState::Replaying(request.clone());
                GraftAction::AbortCaptured
            }
            GraftState::Replaying(captured) => {
                // Back to Idle (via take); the cycle is complete.
                GraftAction::Replay(
                    RequestOverrides::default()
                        .with_url(captured.url)
                        .with_headers(captured.headers),
                )
            }
        }
    }
}
