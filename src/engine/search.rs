//! One-shot search against the site's search box.
//!
//! Reuses the engine's session and interception machinery, but instead
//! of paginating it types a query into the search input and waits for
//! the first matching API response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, ScrapeError};
use crate::traits::browser::Launcher;
use crate::traits::validator::Shape;
use crate::types::config::ScrapeOptions;
use crate::types::endpoint::Endpoint;

use super::{ScrapeControl, ScrapeEngine};

const SEARCH_ATTEMPTS: u32 = 50;

/// The parsed search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub places: Vec<Value>,
    #[serde(default)]
    pub hashtags: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub rank_token: String,
    #[serde(default)]
    pub status: String,
}

/// A one-shot search run.
pub struct Search {
    engine: ScrapeEngine,
    query: String,
}

impl Search {
    /// Pagination-specific options (total, grafting, full detail) have
    /// no effect here; session options (headless, proxy, sleeps) do.
    pub fn new(
        launcher: Arc<dyn Launcher>,
        query: impl Into<String>,
        options: ScrapeOptions,
    ) -> Self {
        let engine = ScrapeEngine::new(launcher, Endpoint::search(), options)
            .with_validator(Arc::new(Shape::Any));
        Self {
            engine,
            query: query.into(),
        }
    }

    pub fn control(&self) -> ScrapeControl {
        self.engine.control()
    }

    /// Run the search. The session is torn down before returning.
    pub async fn get(&mut self) -> Result<SearchResult> {
        self.engine.start().await?;
        let result = self.run().await;
        if result.is_err() {
            self.engine.control().force_stop();
        }
        self.engine.shutdown().await;
        result
    }

    async fn run(&mut self) -> Result<SearchResult> {
        let page = self
            .engine
            .page()
            .ok_or(ScrapeError::Browser(crate::error::BrowserError::PageClosed))?;
        page.click("input[type='text']").await?;
        page.type_text(&self.query).await?;

        for _ in 0..SEARCH_ATTEMPTS {
            self.engine.process_requests().await?;
            self.engine.process_responses().await?;
            if let Some(payload) = self.engine.take_last_payload() {
                return Ok(serde_json::from_value(payload)?);
            }
            tokio::time::sleep(self.engine.options.pause_poll).await;
        }
        Err(ScrapeError::SearchTimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{search_result_body, Fixture, MockLauncher};
    use std::time::Duration;

    fn fast_options() -> ScrapeOptions {
        let mut options = ScrapeOptions::new().with_sleep(Duration::from_millis(10));
        options.pause_poll = Duration::from_millis(10);
        options
    }

    #[tokio::test]
    async fn test_search_parses_the_first_match() {
        let launcher =
            MockLauncher::with_fixtures(vec![Fixture::search("sunset", search_result_body())]);
        let mut search = Search::new(launcher.clone(), "sunset", fast_options());

        let result = search.get().await.expect("search result");
        assert_eq!(result.users.len(), 1);
        assert_eq!(result.hashtags.len(), 1);
        assert!(result.places.is_empty());
        assert_eq!(result.rank_token, "rank-1");
        assert_eq!(result.status, "ok");
        assert_eq!(launcher.typed(), vec!["sunset".to_string()]);
    }

    #[tokio::test]
    async fn test_search_times_out_without_a_match() {
        let launcher = MockLauncher::new();
        let mut search = Search::new(launcher, "sunset", fast_options());
        let result = search.get().await;
        assert!(matches!(result, Err(ScrapeError::SearchTimedOut)));
    }
}
