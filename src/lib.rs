//! Browser-Driven Feed Scraping Library
//!
//! A pull-based engine that drives a headless browser through a
//! paginated social feed and turns the page's own API traffic into a
//! stream of deduplicated, schema-checked records.
//!
//! # Design Philosophy
//!
//! **"The page does the talking"**
//!
//! - No API reverse-engineering: the browser issues the site's own
//!   GraphQL requests; the engine only intercepts them
//! - Pull-based: the page is stimulated only when the consumer asks
//!   for more records
//! - Sessions are disposable: long runs rotate the browser via
//!   capture-and-replay grafting
//! - The automation engine is injected behind traits, so runs are
//!   fully scriptable in tests
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedscrape::{Endpoint, ScrapeEngine, ScrapeOptions};
//! use futures::StreamExt;
//!
//! let launcher = my_launcher(); // Arc<dyn Launcher>
//! let options = ScrapeOptions::new().with_total(100);
//! let mut engine = ScrapeEngine::new(launcher, Endpoint::hashtag("sunset"), options);
//!
//! let mut records = engine.records();
//! while let Some(record) = records.next().await {
//!     println!("{}", record?.id);
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (browser boundary, validator, plugins)
//! - [`types`] - Configuration, endpoints, and records
//! - [`engine`] - The orchestration engine, grafting, and search
//! - [`plugins`] - Bundled plugins
//! - [`pool`] - Bounded pool for deferred transfer jobs
//! - [`testing`] - Scripted browser for tests

pub mod engine;
pub mod error;
pub mod plugins;
pub mod pool;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{BrowserError, BrowserResult, Result, ScrapeError, ValidationError};
pub use traits::{
    browser::{
        Browser, Dialog, InterceptedRequest, InterceptedResponse, LaunchConfig, Launcher, Page,
        RequestDecision, RequestOverrides, RequestSnapshot,
    },
    plugin::{HookContext, HookRegistry, Plugin, Tunables},
    validator::{Shape, Validator},
};
pub use types::{
    config::ScrapeOptions,
    endpoint::Endpoint,
    record::{PageInfo, Record},
};

// Re-export the engine surface
pub use engine::{
    posts::Posts,
    progress::Phase,
    search::{Search, SearchResult},
    ScrapeControl, ScrapeEngine,
};

pub use plugins::LargeFirst;
pub use pool::{Job, JobPool, TransferFn};
