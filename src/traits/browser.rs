//! The browser automation boundary.
//!
//! The engine drives a headless browser through these narrow traits;
//! the automation engine itself (navigation, DOM evaluation, input
//! simulation, network interception primitives) lives outside the
//! crate. `crate::testing::MockLauncher` provides a scripted
//! implementation for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::BrowserResult;

/// Arguments for launching a browser session.
#[derive(Debug, Clone, Default)]
pub struct LaunchConfig {
    pub headless: bool,
    pub args: Vec<String>,
    pub proxy_url: Option<String>,
    pub executable_path: Option<PathBuf>,
}

/// Launches browser sessions. Injected into the engine so that runs
/// can rotate sessions (grafting) without knowing how sessions are
/// obtained.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, config: &LaunchConfig) -> BrowserResult<Arc<dyn Browser>>;
}

/// One live browser session.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a new page in this session.
    async fn new_page(&self) -> BrowserResult<Arc<dyn Page>>;

    /// Close the session.
    async fn close(&self) -> BrowserResult<()>;

    /// Whether the session has disconnected out from under us.
    fn is_disconnected(&self) -> bool;
}

/// Callback invoked with each intercepted request. Callbacks must only
/// append to a buffer; processing happens on the orchestration loop.
pub type RequestCallback = Arc<dyn Fn(InterceptedRequest) + Send + Sync>;

/// Callback invoked with each completed response.
pub type ResponseCallback = Arc<dyn Fn(InterceptedResponse) + Send + Sync>;

/// Callback invoked with the URL of each failed request.
pub type RequestFailedCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback invoked with each dialog the page opens.
pub type DialogCallback = Arc<dyn Fn(Dialog) + Send + Sync>;

/// Callback invoked with each uncaught in-page error.
pub type PageErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// One live page within a browser session.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    /// Evaluate a script in the page, returning its JSON result.
    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value>;

    async fn press_key(&self, key: &str) -> BrowserResult<()>;

    async fn move_mouse(&self, x: u32, y: u32) -> BrowserResult<()>;

    async fn click(&self, selector: &str) -> BrowserResult<()>;

    async fn type_text(&self, text: &str) -> BrowserResult<()>;

    /// Viewport dimensions as (width, height).
    fn viewport(&self) -> (u32, u32);

    /// Enable or disable request interception. While enabled, every
    /// request delivered to the request callback must be resolved via
    /// [`InterceptedRequest::resume`] or [`InterceptedRequest::abort`].
    async fn set_request_interception(&self, enabled: bool) -> BrowserResult<()>;

    fn on_request(&self, callback: RequestCallback);
    fn on_response(&self, callback: ResponseCallback);
    fn on_request_failed(&self, callback: RequestFailedCallback);
    fn on_dialog(&self, callback: DialogCallback);
    fn on_page_error(&self, callback: PageErrorCallback);

    async fn close(&self) -> BrowserResult<()>;

    fn is_closed(&self) -> bool;
}

/// Overrides applied when resuming an intercepted request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOverrides {
    pub url: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

impl RequestOverrides {
    /// Replace the request URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replace the request headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Whether any override is set.
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.headers.is_none()
    }

    /// `None` when no override is set, for pass-through continuation.
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// The decision for one intercepted request.
#[derive(Debug)]
pub enum RequestDecision {
    /// Let the request proceed, optionally with overrides.
    Resume(Option<RequestOverrides>),
    /// Drop the request.
    Abort,
}

/// An in-flight request held until the orchestration loop resolves it.
///
/// Ownership transfers from the browser callback to the loop through
/// the request buffer; resolving it consumes the value.
pub struct InterceptedRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    decision: oneshot::Sender<RequestDecision>,
}

impl InterceptedRequest {
    /// Create a request and the receiver the browser side waits on.
    pub fn new(
        url: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> (Self, oneshot::Receiver<RequestDecision>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                url: url.into(),
                headers,
                decision: tx,
            },
            rx,
        )
    }

    /// An owned copy of the request parameters, for hooks and capture.
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            url: self.url.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Let the request proceed. The browser side may already be gone
    /// (session closed mid-flight), which is not an error here.
    pub fn resume(self, overrides: Option<RequestOverrides>) {
        let _ = self.decision.send(RequestDecision::Resume(overrides));
    }

    /// Drop the request.
    pub fn abort(self) {
        let _ = self.decision.send(RequestDecision::Abort);
    }
}

impl std::fmt::Debug for InterceptedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedRequest")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Owned request parameters without the decision channel.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub url: String,
    pub headers: HashMap<String, String>,
}

/// A completed network response delivered by the browser.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub url: String,
    /// Raw response body; parsed by the orchestration loop.
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl InterceptedResponse {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

/// A dialog opened by the page. The engine dismisses these.
pub struct Dialog {
    pub message: String,
    decision: oneshot::Sender<()>,
}

impl Dialog {
    /// Create a dialog and the receiver resolved on dismissal.
    pub fn new(message: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message: message.into(),
                decision: tx,
            },
            rx,
        )
    }

    /// Dismiss the dialog.
    pub fn dismiss(self) {
        let _ = self.decision.send(());
    }
}

impl std::fmt::Debug for Dialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialog")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
