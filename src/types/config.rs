//! Configuration for a scrape run.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a scrape engine instance.
///
/// Immutable after construction; unset fields take the defaults below.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Total records to collect. 0 means unlimited.
    pub total: usize,

    /// Run the browser in headless mode. Default: true.
    pub headless: bool,

    /// Time to sleep between interactions with the page. Default: 2s.
    pub sleep: Duration,

    /// Time to sleep when rate-limited. Default: 20 minutes.
    pub hibernation: Duration,

    /// Enable the grafting process (browser-session rotation with
    /// request capture/replay). Default: true.
    pub enable_grafting: bool,

    /// Re-fetch each item via its own page visit to obtain the full
    /// payload instead of the list-view entry. Default: false.
    pub full_detail: bool,

    /// Abort the run on the first schema mismatch instead of logging
    /// a warning and emitting the record anyway. Default: false.
    pub strict: bool,

    /// Proxy server for the browser connection.
    pub proxy_url: Option<String>,

    /// Location of the browser binary executable.
    pub executable_path: Option<PathBuf>,

    /// Launch the browser with sandboxing disabled. Default: false.
    pub no_sandbox: bool,

    /// Number of page stimulations between graft cycles. Default: 100.
    pub jump_mod: u32,

    /// Number of "scroll to end" key presses per stimulation.
    /// Default: 2. Plugins may raise this at construction time.
    pub jump_size: u32,

    /// Stimulation count after which a run that has produced nothing
    /// is treated as empty and terminated gracefully. Default: 10.
    pub failed_jump_limit: u32,

    /// Retries for a single per-item fetch before the item is dropped.
    /// Default: 5.
    pub per_item_retries: u32,

    /// Navigation attempts during startup before giving up. Once the
    /// engine has started, navigation retries continue indefinitely.
    /// Default: 3.
    pub startup_attempts: u32,

    /// Sleep between navigation retries. Default: 60s.
    pub navigation_backoff: Duration,

    /// Polling interval while paused or waiting on an in-flight
    /// response. Default: 200ms.
    pub pause_poll: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            total: 0,
            headless: true,
            sleep: Duration::from_secs(2),
            hibernation: Duration::from_secs(60 * 20),
            enable_grafting: true,
            full_detail: false,
            strict: false,
            proxy_url: None,
            executable_path: None,
            no_sandbox: false,
            jump_mod: 100,
            jump_size: 2,
            failed_jump_limit: 10,
            per_item_retries: 5,
            startup_attempts: 3,
            navigation_backoff: Duration::from_secs(60),
            pause_poll: Duration::from_millis(200),
        }
    }
}

impl ScrapeOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total record limit (0 = unlimited).
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    /// Set headless mode.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the inter-interaction sleep.
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Set the rate-limit hibernation duration.
    pub fn with_hibernation(mut self, hibernation: Duration) -> Self {
        self.hibernation = hibernation;
        self
    }

    /// Enable or disable grafting.
    pub fn with_grafting(mut self, enabled: bool) -> Self {
        self.enable_grafting = enabled;
        self
    }

    /// Enable full-detail mode.
    pub fn with_full_detail(mut self, full_detail: bool) -> Self {
        self.full_detail = full_detail;
        self
    }

    /// Enable strict validation.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set a proxy server for the browser connection.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Set the browser executable path.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Disable browser sandboxing.
    pub fn without_sandbox(mut self) -> Self {
        self.no_sandbox = true;
        self
    }

    /// Set the stimulation count between graft cycles.
    pub fn with_jump_mod(mut self, jump_mod: u32) -> Self {
        self.jump_mod = jump_mod;
        self
    }

    /// Set the empty-run termination threshold.
    pub fn with_failed_jump_limit(mut self, limit: u32) -> Self {
        self.failed_jump_limit = limit;
        self
    }

    /// Set the navigation retry backoff.
    pub fn with_navigation_backoff(mut self, backoff: Duration) -> Self {
        self.navigation_backoff = backoff;
        self
    }

    /// Set the pause/wait polling interval.
    pub fn with_pause_poll(mut self, interval: Duration) -> Self {
        self.pause_poll = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ScrapeOptions::default();
        assert_eq!(options.total, 0);
        assert!(options.headless);
        assert!(options.enable_grafting);
        assert!(!options.full_detail);
        assert!(!options.strict);
        assert_eq!(options.sleep, Duration::from_secs(2));
        assert_eq!(options.hibernation, Duration::from_secs(1200));
        assert_eq!(options.jump_mod, 100);
        assert_eq!(options.failed_jump_limit, 10);
    }

    #[test]
    fn test_builder() {
        let options = ScrapeOptions::new()
            .with_total(50)
            .with_strict(true)
            .with_grafting(false)
            .with_proxy("http://127.0.0.1:8080");

        assert_eq!(options.total, 50);
        assert!(options.strict);
        assert!(!options.enable_grafting);
        assert_eq!(options.proxy_url.as_deref(), Some("http://127.0.0.1:8080"));
    }
}
