//! Typed errors for the scraping library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can cross the engine boundary to the caller.
///
/// Recoverable conditions (malformed response bodies, single request
/// failures, per-item fetch failures, rate limiting) are absorbed and
/// logged inside the engine; only startup failures and strict-mode
/// validation failures surface here.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Browser automation operation failed
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Payload failed schema validation in strict mode
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Initial navigation failed beyond the bounded retry count
    #[error("failed to visit {url} after {attempts} attempts")]
    StartupNavigation { url: String, attempts: u32 },

    /// No matching search response arrived within the polling window
    #[error("search timed out waiting for a matching response")]
    SearchTimedOut,

    /// JSON decoding error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The run was force-stopped before completing
    #[error("scrape cancelled")]
    Cancelled,
}

/// Errors reported by the injected browser automation engine.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Browser session launch failed
    #[error("launch failed: {0}")]
    Launch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Page navigation failed
    #[error("navigation failed: {url}")]
    Navigation {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// In-page script evaluation failed
    #[error("evaluation failed: {0}")]
    Evaluate(String),

    /// Input simulation (keyboard/pointer/click) failed
    #[error("input simulation failed: {0}")]
    Input(String),

    /// The page has been closed
    #[error("page closed")]
    PageClosed,

    /// The browser session has disconnected
    #[error("browser disconnected")]
    Disconnected,
}

/// A payload's shape did not match the expected schema.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more paths in the payload did not decode
    #[error("payload shape mismatch: {}", report.join("; "))]
    Mismatch { report: Vec<String> },
}

/// Result type alias for scrape operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for browser-boundary operations.
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;
