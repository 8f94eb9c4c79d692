//! The scrape orchestration engine.
//!
//! The engine drives a browser page through a feed, intercepts the
//! page's own paginated API traffic, and turns matched responses into
//! a deduplicated stream of records. Consumers pull the stream; the
//! engine stimulates the page only when the consumer asks for more.

pub mod buffers;
pub mod dedup;
pub mod graft;
pub mod posts;
pub mod progress;
pub mod search;

use async_stream::stream;
use futures::future::join_all;
use futures::Stream;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::traits::browser::{
    Browser, InterceptedRequest, LaunchConfig, Launcher, Page, RequestOverrides,
};
use crate::traits::plugin::{HookContext, HookRegistry, Plugin, Tunables};
use crate::traits::validator::{feed_item_shape, full_item_shape, Validator};
use crate::types::config::ScrapeOptions;
use crate::types::endpoint::Endpoint;
use crate::types::record::{lookup_path, PageInfo, Record};

use buffers::EventBuffers;
use dedup::IdSet;
use graft::{GraftAction, GraftState};
use progress::{Phase, ProgressReporter};

/// Extracts the item payload from an individual item page.
pub(crate) const ITEM_DATA_SCRIPT: &str =
    "window._sharedData.entry_data.PostPage[0].graphql";

/// Collects item links already rendered on the main page.
pub(crate) const LINK_SCAN_SCRIPT: &str =
    "Array.from(document.querySelectorAll(\"a[href*='/p/']\")).map(a => a.href)";

/// Poll attempts for a replayed request's response before the session
/// rotates anyway.
const REPLAY_WAIT_ATTEMPTS: u32 = 50;

/// Shared run flags, owned by the engine and its control handles.
#[derive(Debug, Default)]
struct ControlFlags {
    paused: AtomicBool,
    hibernate: AtomicBool,
    finished: AtomicBool,
    cancel: CancellationToken,
}

impl ControlFlags {
    fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn force_stop(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

/// A cloneable handle for steering a running engine from outside the
/// consuming task.
#[derive(Clone)]
pub struct ScrapeControl {
    flags: Arc<ControlFlags>,
}

impl ScrapeControl {
    /// Pause or resume stimulation. While paused the engine polls
    /// instead of jumping; buffered records still drain.
    pub fn pause(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Flip the hibernation flag, as a rate-limit response does.
    pub fn toggle_hibernation(&self) {
        self.flags.hibernate.fetch_xor(true, Ordering::SeqCst);
    }

    /// End the run. The stream finishes after draining buffered
    /// records.
    pub fn force_stop(&self) {
        self.flags.force_stop();
    }
}

/// The scrape engine for one feed.
pub struct ScrapeEngine {
    launcher: Arc<dyn Launcher>,
    endpoint: Endpoint,
    options: ScrapeOptions,
    validator: Arc<dyn Validator>,
    hooks: HookRegistry,
    tunables: Arc<Tunables>,
    flags: Arc<ControlFlags>,
    buffers: EventBuffers,
    progress: ProgressReporter,

    browser: Option<Arc<dyn Browser>>,
    page: Option<Arc<dyn Page>>,

    graft: GraftState,
    ids: IdSet,
    seen_shortcodes: HashSet<String>,
    pending_shortcodes: Vec<String>,
    pending_records: VecDeque<Record>,
    last_payload: Option<Value>,

    scraped: usize,
    jumps: u32,
    responses_seen: usize,
    restart_pending: bool,
    replay_url: Option<String>,
    started: bool,
}

impl ScrapeEngine {
    pub fn new(launcher: Arc<dyn Launcher>, endpoint: Endpoint, options: ScrapeOptions) -> Self {
        let tunables = Arc::new(Tunables::new(options.jump_size, options.jump_mod));
        let progress = ProgressReporter::new(endpoint.id.clone());
        // Full-detail runs validate item-page payloads, not edges.
        let validator: Arc<dyn Validator> = if options.full_detail {
            Arc::new(full_item_shape())
        } else {
            Arc::new(feed_item_shape())
        };
        Self {
            launcher,
            endpoint,
            options,
            validator,
            hooks: HookRegistry::default(),
            tunables,
            flags: Arc::new(ControlFlags::default()),
            buffers: EventBuffers::new(),
            progress,
            browser: None,
            page: None,
            graft: GraftState::default(),
            ids: IdSet::new(),
            seen_shortcodes: HashSet::new(),
            pending_shortcodes: Vec::new(),
            pending_records: VecDeque::new(),
            last_payload: None,
            scraped: 0,
            jumps: 0,
            responses_seen: 0,
            restart_pending: false,
            replay_url: None,
            started: false,
        }
    }

    /// Replace the payload validator.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Register plugins. Construction hooks run here, in order.
    pub fn with_plugins(mut self, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        self.hooks = HookRegistry::new(plugins);
        self.hooks.construction(&self.tunables);
        self
    }

    /// A control handle for this engine.
    pub fn control(&self) -> ScrapeControl {
        ScrapeControl {
            flags: self.flags.clone(),
        }
    }

    /// Records scraped so far.
    pub fn scraped(&self) -> usize {
        self.scraped
    }

    /// The record stream. Starts the browser on first poll; the
    /// session is torn down when the stream ends or errors. Dropping
    /// the stream mid-run leaves the session open so it can be resumed
    /// later; call [`close`](Self::close) to tear it down instead.
    pub fn records(&mut self) -> Pin<Box<dyn Stream<Item = Result<Record>> + Send + '_>> {
        Box::pin(stream! {
            if !self.started {
                if let Err(error) = self.start().await {
                    yield Err(error);
                    return;
                }
            }
            loop {
                if let Err(error) = self.advance().await {
                    self.shutdown().await;
                    yield Err(error);
                    return;
                }
                while let Some(record) = self.pending_records.pop_front() {
                    yield Ok(record);
                }
                if self.flags.finished() {
                    break;
                }
            }
            self.shutdown().await;
        })
    }

    /// Tear down the session without consuming the stream, for callers
    /// that abandoned [`records`](Self::records) mid-run. A stream that
    /// ran to completion has already closed the session.
    pub async fn close(&mut self) {
        self.shutdown().await;
    }

    /// Launch the browser and navigate to the feed.
    pub(crate) async fn start(&mut self) -> Result<()> {
        self.start_session().await?;
        self.started = true;
        Ok(())
    }

    /// Close the session and mark the run finished.
    pub(crate) async fn shutdown(&mut self) {
        self.flags.finished.store(true, Ordering::SeqCst);
        self.stop_session().await;
    }

    pub(crate) fn page(&self) -> Option<Arc<dyn Page>> {
        self.page.clone()
    }

    /// The most recent matched, parsed response payload.
    pub(crate) fn take_last_payload(&mut self) -> Option<Value> {
        self.last_payload.take()
    }

    /// One pull of the orchestration loop: drain network traffic,
    /// stimulate the page, and return once records are buffered or the
    /// run is finished.
    async fn advance(&mut self) -> Result<()> {
        loop {
            self.process_requests().await?;

            if self.restart_pending {
                self.restart_pending = false;
                self.await_replay_response().await?;
                self.restart_session().await?;
            }

            self.process_responses().await?;
            self.fetch_pending_items().await?;

            if self.flags.finished() {
                break;
            }

            self.wait_if_paused().await;
            self.jump().await?;

            if self.jumps == self.options.failed_jump_limit && self.nothing_produced() {
                info!(id = %self.endpoint.id, jumps = self.jumps, "feed produced nothing, stopping");
                self.flags.finished.store(true, Ordering::SeqCst);
                continue;
            }

            let jump_mod = self.tunables.jump_mod();
            if self.options.enable_grafting
                && jump_mod > 0
                && self.jumps % jump_mod == 0
                && !self.graft.is_active()
            {
                self.begin_graft().await;
            }

            self.sleep_with_progress(self.options.sleep).await;

            if self.flags.hibernate.swap(false, Ordering::SeqCst) {
                info!(id = %self.endpoint.id, "rate limited, hibernating");
                self.sleep(self.options.hibernation).await;
            }

            if !self.pending_records.is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn nothing_produced(&self) -> bool {
        if self.options.full_detail {
            self.responses_seen == 0
        } else {
            self.scraped == 0
        }
    }

    /// Resolve every buffered request and dismiss buffered dialogs.
    pub(crate) async fn process_requests(&mut self) -> Result<()> {
        for dialog in self.buffers.drain_dialogs() {
            debug!(message = %dialog.message, "dismissing dialog");
            dialog.dismiss();
        }

        let context = self.hook_context();
        for request in self.buffers.drain_requests() {
            if !self.endpoint.matches_api_url(&request.url) {
                request.resume(None);
                continue;
            }

            let snapshot = request.snapshot();
            match self.graft.on_request(&snapshot) {
                GraftAction::AbortCaptured => {
                    self.progress.set_phase(Phase::RequestAborted);
                    request.abort();
                    continue;
                }
                GraftAction::Replay(overrides) => {
                    debug!(url = %request.url, "replaying captured request");
                    self.replay_url = overrides
                        .url
                        .clone()
                        .or_else(|| Some(request.url.clone()));
                    request.resume(Some(overrides));
                    self.restart_pending = true;
                    continue;
                }
                GraftAction::PassThrough => {}
            }

            let overrides = Mutex::new(RequestOverrides::default());
            self.hooks.request(&snapshot, &overrides, &context).await;
            let overrides = overrides.into_inner().unwrap_or_else(|e| e.into_inner());
            request.resume(overrides.into_option());
        }
        Ok(())
    }

    /// Parse every buffered matched response and collect its records.
    pub(crate) async fn process_responses(&mut self) -> Result<()> {
        let context = self.hook_context();
        for response in self.buffers.drain_responses() {
            if !self.endpoint.matches_api_url(&response.url) {
                continue;
            }
            self.responses_seen += 1;
            if self.replay_url.as_deref() == Some(response.url.as_str()) {
                self.replay_url = None;
            }

            let payload: Value = match serde_json::from_str(&response.body) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(url = %response.url, %error, "unparseable response body");
                    continue;
                }
            };

            if payload.get("status").and_then(Value::as_str) == Some("fail") {
                self.flags.hibernate.store(true, Ordering::SeqCst);
                continue;
            }

            self.hooks.response(&response, &context).await;
            self.last_payload = Some(payload.clone());

            if self.endpoint.edges_path.is_empty() {
                continue;
            }

            if let Some(edges) = lookup_path(&payload, &self.endpoint.edges_path)
                .and_then(Value::as_array)
            {
                for edge in edges.clone() {
                    if self.options.full_detail {
                        self.queue_item_fetch(&edge);
                    } else {
                        self.accept_edge(edge)?;
                    }
                }
            }

            let info = PageInfo::from_payload(&payload, &self.endpoint.page_info_path);
            if !info.continues() {
                debug!(id = %self.endpoint.id, "feed exhausted");
                self.flags.finished.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Accept one list-view edge as a record.
    fn accept_edge(&mut self, edge: Value) -> Result<()> {
        let Some(id) = extract_id(&edge) else {
            warn!("edge carried no id, skipping");
            return Ok(());
        };
        let shortcode = lookup_path(&edge, "node.shortcode")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.accept(id, shortcode, edge)
    }

    /// Validate and buffer a record, honoring the target and the
    /// dedup set.
    fn accept(&mut self, id: String, shortcode: Option<String>, payload: Value) -> Result<()> {
        if self.target_reached() {
            self.flags.finished.store(true, Ordering::SeqCst);
            return Ok(());
        }
        if self.ids.add(&id) {
            return Ok(());
        }

        if let Err(error) = self.validator.validate(&payload) {
            if self.options.strict {
                self.flags.force_stop();
                return Err(error.into());
            }
            warn!(%id, %error, "payload failed validation");
        }

        let mut record = Record::new(id, payload);
        if let Some(shortcode) = shortcode {
            record = record.with_shortcode(shortcode);
        }
        self.pending_records.push_back(record);
        self.scraped += 1;
        self.progress.record_scraped(self.scraped);

        if self.target_reached() {
            self.flags.finished.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn target_reached(&self) -> bool {
        self.options.total > 0 && self.scraped >= self.options.total
    }

    /// Queue an edge's shortcode for a full-detail visit.
    fn queue_item_fetch(&mut self, edge: &Value) {
        let Some(shortcode) = lookup_path(edge, "node.shortcode").and_then(Value::as_str) else {
            return;
        };
        if self.seen_shortcodes.insert(shortcode.to_string()) {
            self.pending_shortcodes.push(shortcode.to_string());
        }
    }

    /// Visit every queued item page concurrently and accept the
    /// fetched payloads.
    async fn fetch_pending_items(&mut self) -> Result<()> {
        if self.pending_shortcodes.is_empty() {
            return Ok(());
        }
        let Some(browser) = self.browser.clone() else {
            return Ok(());
        };

        self.progress.set_phase(Phase::Branching);
        let shortcodes = std::mem::take(&mut self.pending_shortcodes);
        let fetches = shortcodes
            .iter()
            .map(|shortcode| self.fetch_item(browser.clone(), shortcode.clone()));
        let results = join_all(fetches).await;
        self.progress.set_phase(Phase::Scraping);

        let context = self.hook_context();
        for (shortcode, payload) in shortcodes.into_iter().zip(results) {
            let Some(payload) = payload else { continue };
            self.hooks.item_fetched(&payload, &context).await;
            let Some(id) = extract_id(&payload) else {
                warn!(%shortcode, "item payload carried no id, skipping");
                continue;
            };
            self.accept(id, Some(shortcode), payload)?;
        }
        Ok(())
    }

    /// Fetch one item page, retrying before giving the item up.
    async fn fetch_item(&self, browser: Arc<dyn Browser>, shortcode: String) -> Option<Value> {
        for attempt in 1..=self.options.per_item_retries {
            match self.try_fetch_item(&browser, &shortcode).await {
                Ok(payload) => return Some(payload),
                Err(error) => {
                    debug!(%shortcode, attempt, %error, "item fetch failed");
                    self.sleep(self.options.sleep).await;
                }
            }
        }
        warn!(%shortcode, "item fetch exhausted retries, dropping");
        None
    }

    async fn try_fetch_item(
        &self,
        browser: &Arc<dyn Browser>,
        shortcode: &str,
    ) -> Result<Value> {
        let page = browser.new_page().await?;
        // Item pages only need their own document; everything else is
        // dropped at the interception layer.
        page.on_request(Arc::new(|request: InterceptedRequest| {
            if request.url.contains("/p/") {
                request.resume(None);
            } else {
                request.abort();
            }
        }));
        page.set_request_interception(true).await?;

        let result = async {
            page.goto(&self.endpoint.item_url(shortcode)).await?;
            let payload = page.evaluate(ITEM_DATA_SCRIPT).await?;
            Ok(payload)
        }
        .await;
        let _ = page.close().await;
        result
    }

    /// Stimulate the page: scroll to the top, then repeatedly to the
    /// end, then wiggle the pointer somewhere on screen.
    async fn jump(&mut self) -> Result<()> {
        let Some(page) = self.page.clone() else {
            return Ok(());
        };
        page.press_key("PageUp").await?;
        for _ in 0..self.tunables.jump_size() {
            page.press_key("End").await?;
        }
        let (width, height) = page.viewport();
        page.move_mouse(
            rand::random_range(0..width.max(1)),
            rand::random_range(0..height.max(1)),
        )
        .await?;

        self.jumps += 1;
        self.progress.record_jump(self.jumps);
        Ok(())
    }

    /// Begin a graft cycle: the next API request is captured, and the
    /// session rotates once the capture is replayed.
    async fn begin_graft(&mut self) {
        self.progress.set_phase(Phase::Grafting);
        self.hooks.graft(&self.hook_context()).await;
        self.graft.begin();
    }

    async fn start_session(&mut self) -> Result<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_start_session().await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    self.stop_session().await;
                    if !self.started && attempts >= self.options.startup_attempts {
                        return Err(ScrapeError::StartupNavigation {
                            url: self.endpoint.page_url(),
                            attempts,
                        });
                    }
                    warn!(%error, attempts, "session start failed, backing off");
                    self.sleep(self.options.navigation_backoff).await;
                    if self.flags.cancel.is_cancelled() {
                        return Err(ScrapeError::Cancelled);
                    }
                }
            }
        }
    }

    async fn try_start_session(&mut self) -> Result<()> {
        self.progress.set_phase(Phase::Launching);
        let browser = self.launcher.launch(&self.launch_config()).await?;
        let page = browser.new_page().await?;

        self.progress.set_phase(Phase::Navigating);
        page.goto(&self.endpoint.page_url()).await?;

        // Interception comes up only after the document has loaded, so
        // navigation itself is never held by the request buffer.
        self.install_callbacks(&page);
        page.set_request_interception(true).await?;

        self.browser = Some(browser);
        self.page = Some(page);
        self.hooks.browser_ready(&self.hook_context()).await;

        if self.options.full_detail {
            self.scan_initial_links().await?;
        }

        self.progress.set_phase(Phase::Scraping);
        Ok(())
    }

    fn install_callbacks(&self, page: &Arc<dyn Page>) {
        let buffers = self.buffers.clone();
        page.on_request(Arc::new(move |request| buffers.push_request(request)));

        let buffers = self.buffers.clone();
        page.on_response(Arc::new(move |response| buffers.push_response(response)));

        let buffers = self.buffers.clone();
        page.on_dialog(Arc::new(move |dialog| buffers.push_dialog(dialog)));

        page.on_request_failed(Arc::new(|url| debug!(%url, "request failed")));
        page.on_page_error(Arc::new(|message| debug!(%message, "page error")));
    }

    /// Pick up item links the main page rendered before interception.
    async fn scan_initial_links(&mut self) -> Result<()> {
        let Some(page) = self.page.clone() else {
            return Ok(());
        };
        let links = page.evaluate(LINK_SCAN_SCRIPT).await?;
        let Some(links) = links.as_array() else {
            return Ok(());
        };
        for link in links {
            let Some(shortcode) = link.as_str().and_then(shortcode_from_url) else {
                continue;
            };
            if self.seen_shortcodes.insert(shortcode.to_string()) {
                self.pending_shortcodes.push(shortcode.to_string());
            }
        }
        Ok(())
    }

    /// Wait for the replayed request's response to land before the
    /// session goes down. The replay carries the pagination cursor; a
    /// rotation that races it would restart from the top of the feed.
    async fn await_replay_response(&mut self) -> Result<()> {
        for _ in 0..REPLAY_WAIT_ATTEMPTS {
            self.process_responses().await?;
            if self.replay_url.is_none() || self.flags.cancel.is_cancelled() {
                break;
            }
            self.sleep(self.options.pause_poll).await;
        }
        self.replay_url = None;
        Ok(())
    }

    async fn restart_session(&mut self) -> Result<()> {
        info!(id = %self.endpoint.id, "rotating browser session");
        self.stop_session().await;
        self.start_session().await
    }

    async fn stop_session(&mut self) {
        self.progress.set_phase(Phase::Closing);
        self.buffers.clear_network();
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(browser) = self.browser.take() {
            let _ = browser.close().await;
        }
    }

    fn launch_config(&self) -> LaunchConfig {
        let mut args = Vec::new();
        if self.options.no_sandbox {
            args.push("--no-sandbox".to_string());
        }
        LaunchConfig {
            headless: self.options.headless,
            args,
            proxy_url: self.options.proxy_url.clone(),
            executable_path: self.options.executable_path.clone(),
        }
    }

    fn hook_context(&self) -> HookContext {
        HookContext {
            page: self.page.clone(),
            tunables: self.tunables.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    async fn wait_if_paused(&mut self) {
        let mut was_paused = false;
        while self.flags.paused.load(Ordering::SeqCst)
            && !self.flags.finished()
            && !self.flags.cancel.is_cancelled()
        {
            if !was_paused {
                self.progress.set_phase(Phase::Paused);
                was_paused = true;
            }
            self.sleep(self.options.pause_poll).await;
        }
        if was_paused {
            self.progress.set_phase(Phase::Scraping);
        }
    }

    /// A cancellable sleep.
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.flags.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    /// Sleep in one-second steps, logging progress each step.
    async fn sleep_with_progress(&self, duration: Duration) {
        let step = Duration::from_secs(1);
        let mut remaining = duration;
        while !remaining.is_zero() {
            let chunk = remaining.min(step);
            self.sleep(chunk).await;
            self.progress.report();
            if self.flags.cancel.is_cancelled() {
                return;
            }
            remaining -= chunk;
        }
    }
}

/// The record id, wherever the payload variant keeps it.
fn extract_id(payload: &Value) -> Option<String> {
    for path in [
        "node.id",
        "graphql.shortcode_media.id",
        "shortcode_media.id",
        "id",
    ] {
        if let Some(id) = lookup_path(payload, path).and_then(Value::as_str) {
            return Some(id.to_string());
        }
    }
    None
}

/// The shortcode segment of an item URL (`.../p/<shortcode>/`).
fn shortcode_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/p/")?;
    let shortcode = rest.split('/').next()?;
    if shortcode.is_empty() {
        None
    } else {
        Some(shortcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        hashtag_feed_body, rate_limited_body, Decision, Fixture, MockLauncher,
    };
    use futures::StreamExt;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Instant;

    fn fast_options() -> ScrapeOptions {
        ScrapeOptions::new()
            .with_sleep(Duration::from_millis(10))
            .with_pause_poll(Duration::from_millis(10))
            .with_grafting(false)
    }

    async fn collect(engine: &mut ScrapeEngine) -> Vec<Record> {
        let mut records = Vec::new();
        let mut stream = engine.records();
        while let Some(record) = stream.next().await {
            records.push(record.expect("record"));
        }
        records
    }

    #[tokio::test]
    async fn test_paginates_and_deduplicates() {
        let launcher = MockLauncher::with_fixtures(vec![
            Fixture::api("p0", hashtag_feed_body(&["a", "b"], true)),
            Fixture::api("p1", hashtag_feed_body(&["b", "c"], false)),
        ]);
        let mut engine = ScrapeEngine::new(
            launcher.clone(),
            Endpoint::hashtag("sunset"),
            fast_options(),
        );

        let records = collect(&mut engine).await;
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(engine.scraped(), 3);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(
            records[0].shortcode.as_deref(),
            Some("sc-a"),
            "shortcode travels with the record"
        );
    }

    #[tokio::test]
    async fn test_stops_exactly_at_target() {
        let launcher = MockLauncher::with_fixtures(vec![
            Fixture::api("p0", hashtag_feed_body(&["a", "b", "c"], true)),
            Fixture::api("p1", hashtag_feed_body(&["d", "e"], false)),
        ]);
        let mut engine = ScrapeEngine::new(
            launcher,
            Endpoint::hashtag("sunset"),
            fast_options().with_total(2),
        );

        let records = collect(&mut engine).await;
        assert_eq!(records.len(), 2);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_graft_captures_and_replays() {
        let mut headers = HashMap::new();
        headers.insert("x-csrftoken".to_string(), "token-1".to_string());
        let launcher = MockLauncher::with_fixtures(vec![
            Fixture::api("p0", hashtag_feed_body(&["a", "b"], true)),
            Fixture::api("p1", hashtag_feed_body(&["c", "d"], false)).with_headers(headers),
        ]);
        let mut engine = ScrapeEngine::new(
            launcher.clone(),
            Endpoint::hashtag("sunset"),
            fast_options().with_grafting(true).with_jump_mod(2),
        );

        let records = collect(&mut engine).await;
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);

        // Session rotated exactly once
        assert_eq!(launcher.launches(), 2);

        let decisions = launcher.decisions();
        assert_eq!(decisions.len(), 3, "decisions: {decisions:?}");
        assert!(matches!(&decisions[0], Decision::Continued { overrides: None, .. }));
        assert!(matches!(&decisions[1], Decision::Aborted { .. }));
        match &decisions[2] {
            Decision::Continued {
                overrides: Some(overrides),
                ..
            } => {
                // The replay carries the captured request verbatim
                assert_eq!(
                    overrides.url.as_deref(),
                    Some(Fixture::api_url("p1").as_str())
                );
                assert_eq!(
                    overrides.headers.as_ref().unwrap().get("x-csrftoken"),
                    Some(&"token-1".to_string())
                );
            }
            other => panic!("unexpected final decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_graft_waits_for_slow_replay_response() {
        let launcher = MockLauncher::with_fixtures(vec![
            Fixture::api("p0", hashtag_feed_body(&["a", "b"], true)),
            Fixture::api("p1", hashtag_feed_body(&["c", "d"], false)),
        ]);
        launcher.set_response_delay(Duration::from_millis(50));
        let mut engine = ScrapeEngine::new(
            launcher.clone(),
            Endpoint::hashtag("sunset"),
            fast_options().with_grafting(true).with_jump_mod(2),
        );

        let records = collect(&mut engine).await;
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        // The rotation waits for the replayed page instead of racing it
        assert_eq!(ids, ["a", "b", "c", "d"]);
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_hibernates() {
        let launcher = MockLauncher::with_fixtures(vec![
            Fixture::api("p0", rate_limited_body()),
            Fixture::api("p1", hashtag_feed_body(&["a"], false)),
        ]);
        let hibernation = Duration::from_millis(200);
        let mut engine = ScrapeEngine::new(
            launcher,
            Endpoint::hashtag("sunset"),
            fast_options().with_hibernation(hibernation),
        );

        let started = Instant::now();
        let records = collect(&mut engine).await;
        assert_eq!(records.len(), 1);
        assert!(
            started.elapsed() >= hibernation,
            "run finished without hibernating"
        );
    }

    #[tokio::test]
    async fn test_strict_validation_aborts() {
        let body = json!({
            "data": {"hashtag": {"edge_hashtag_to_media": {
                "page_info": {"has_next_page": false, "end_cursor": null},
                "edges": [{"node": {"id": "a", "is_video": "yes"}}]
            }}},
            "status": "ok"
        })
        .to_string();
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api("p0", body)]);
        let mut engine = ScrapeEngine::new(
            launcher,
            Endpoint::hashtag("sunset"),
            fast_options().with_strict(true),
        );

        let mut stream = engine.records();
        let first = stream.next().await.expect("stream item");
        assert!(matches!(first, Err(ScrapeError::Validation(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lenient_validation_still_emits() {
        let body = json!({
            "data": {"hashtag": {"edge_hashtag_to_media": {
                "page_info": {"has_next_page": false, "end_cursor": null},
                "edges": [{"node": {"id": "a", "is_video": "yes"}}]
            }}},
            "status": "ok"
        })
        .to_string();
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api("p0", body)]);
        let mut engine =
            ScrapeEngine::new(launcher, Endpoint::hashtag("sunset"), fast_options());

        let records = collect(&mut engine).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[tokio::test]
    async fn test_empty_feed_finishes_gracefully() {
        let launcher = MockLauncher::new();
        let mut engine = ScrapeEngine::new(
            launcher,
            Endpoint::hashtag("sunset"),
            fast_options().with_failed_jump_limit(3),
        );

        let records = collect(&mut engine).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_pause_defers_stimulation() {
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api(
            "p0",
            hashtag_feed_body(&["a"], false),
        )]);
        let mut engine =
            ScrapeEngine::new(launcher, Endpoint::hashtag("sunset"), fast_options());
        let control = engine.control();
        control.pause(true);

        let resume = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            control.pause(false);
        });

        let started = Instant::now();
        let records = collect(&mut engine).await;
        assert_eq!(records.len(), 1);
        assert!(
            started.elapsed() >= Duration::from_millis(100),
            "records arrived while paused"
        );
        resume.await.expect("resume task");
    }

    #[tokio::test]
    async fn test_force_stop_ends_the_stream() {
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api(
            "p0",
            hashtag_feed_body(&["a"], true),
        )]);
        let mut engine =
            ScrapeEngine::new(launcher, Endpoint::hashtag("sunset"), fast_options());
        let control = engine.control();

        let mut stream = engine.records();
        let first = stream.next().await.expect("first record").expect("record");
        assert_eq!(first.id, "a");
        control.force_stop();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_startup_navigation_failure_is_fatal() {
        let launcher = MockLauncher::new();
        launcher.fail_next_navigations(10);
        let mut engine = ScrapeEngine::new(
            launcher.clone(),
            Endpoint::hashtag("sunset"),
            fast_options().with_navigation_backoff(Duration::from_millis(10)),
        );

        let mut stream = engine.records();
        let first = stream.next().await.expect("stream item");
        match first {
            Err(ScrapeError::StartupNavigation { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected stream item: {:?}", other),
        }
        assert_eq!(launcher.launches(), 3);
    }

    #[tokio::test]
    async fn test_full_detail_fetches_item_pages() {
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api(
            "p0",
            hashtag_feed_body(&["a", "b"], false),
        )]);
        launcher.set_initial_links(vec!["https://instagram.com/p/sc-z/".to_string()]);
        launcher.set_items(HashMap::from([
            ("sc-a".to_string(), json!({"shortcode_media": {"id": "a", "caption": "first"}})),
            ("sc-b".to_string(), json!({"shortcode_media": {"id": "b", "caption": "second"}})),
            ("sc-z".to_string(), json!({"shortcode_media": {"id": "z", "caption": "initial"}})),
        ]));
        let mut engine = ScrapeEngine::new(
            launcher.clone(),
            Endpoint::hashtag("sunset"),
            fast_options().with_full_detail(true),
        );

        let mut records = collect(&mut engine).await;
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "z"]);
        assert_eq!(
            records[0].payload["shortcode_media"]["caption"],
            json!("first")
        );
        // Each item was visited on its own page
        let visited = launcher.goto_urls();
        assert!(visited.iter().any(|url| url.ends_with("/p/sc-a")));
        assert!(visited.iter().any(|url| url.ends_with("/p/sc-z")));
    }

    #[tokio::test]
    async fn test_strict_full_detail_accepts_valid_items() {
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api(
            "p0",
            hashtag_feed_body(&["a"], false),
        )]);
        launcher.set_items(HashMap::from([(
            "sc-a".to_string(),
            json!({"shortcode_media": {"id": "a", "shortcode": "sc-a"}}),
        )]));
        let mut engine = ScrapeEngine::new(
            launcher,
            Endpoint::hashtag("sunset"),
            fast_options().with_full_detail(true).with_strict(true),
        );

        // The default validator follows the mode: item-page payloads
        // here, not list-view edges
        let records = collect(&mut engine).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[tokio::test]
    async fn test_close_tears_down_abandoned_stream() {
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api(
            "p0",
            hashtag_feed_body(&["a"], true),
        )]);
        let mut engine =
            ScrapeEngine::new(launcher, Endpoint::hashtag("sunset"), fast_options());
        {
            let mut stream = engine.records();
            let first = stream.next().await.expect("first record").expect("record");
            assert_eq!(first.id, "a");
        }
        assert!(engine.page().is_some(), "session outlives the dropped stream");
        engine.close().await;
        assert!(engine.page().is_none());
    }

    #[test]
    fn test_shortcode_from_url() {
        assert_eq!(
            shortcode_from_url("https://instagram.com/p/Bx1/"),
            Some("Bx1")
        );
        assert_eq!(shortcode_from_url("https://instagram.com/p/Bx1"), Some("Bx1"));
        assert_eq!(shortcode_from_url("https://instagram.com/explore/"), None);
    }
}
