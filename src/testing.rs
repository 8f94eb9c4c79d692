//! Scripted browser for tests.
//!
//! [`MockLauncher`] stands in for a real automation engine: it serves
//! a fixed sequence of API fixtures through the interception path and
//! records every decision the engine makes about them. One fixture is
//! emitted per page stimulation (mouse move) or text entry; an aborted
//! fixture is re-emitted on the next stimulation, which is what a
//! fresh page retrying its API request looks like from the engine's
//! side.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::engine::{ITEM_DATA_SCRIPT, LINK_SCAN_SCRIPT};
use crate::error::{BrowserError, BrowserResult};
use crate::traits::browser::{
    Browser, DialogCallback, InterceptedRequest, InterceptedResponse, LaunchConfig, Launcher,
    Page, PageErrorCallback, RequestCallback, RequestDecision, RequestFailedCallback,
    RequestOverrides, ResponseCallback,
};

/// One scripted API exchange: the request the page would issue and the
/// body served if the engine lets it through.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Fixture {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// A fixture on the paginated GraphQL API.
    pub fn api(tag: &str, body: impl Into<String>) -> Self {
        Self::new(Self::api_url(tag), body)
    }

    pub fn api_url(tag: &str) -> String {
        format!("https://www.instagram.com/graphql/query?query_hash={tag}")
    }

    /// A fixture on the search API.
    pub fn search(query: &str, body: impl Into<String>) -> Self {
        Self::new(
            format!("https://www.instagram.com/web/search/topsearch/?query={query}"),
            body,
        )
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// How the engine resolved one emitted fixture.
#[derive(Debug, Clone)]
pub enum Decision {
    Continued {
        url: String,
        overrides: Option<RequestOverrides>,
    },
    Aborted {
        url: String,
    },
}

#[derive(Default)]
struct MockState {
    fixtures: Vec<Fixture>,
    cursor: usize,
    decisions: Vec<Decision>,
    launches: usize,
    goto_urls: Vec<String>,
    typed: Vec<String>,
    items: HashMap<String, Value>,
    initial_links: Vec<String>,
    fail_navigations: usize,
    response_delay: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A scripted [`Launcher`]. State is shared across the sessions it
/// launches, so fixture emission continues across a session rotation.
pub struct MockLauncher {
    state: Arc<Mutex<MockState>>,
}

impl MockLauncher {
    pub fn new() -> Arc<Self> {
        Self::with_fixtures(Vec::new())
    }

    pub fn with_fixtures(fixtures: Vec<Fixture>) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(MockState {
                fixtures,
                ..MockState::default()
            })),
        })
    }

    /// Item payloads served by shortcode through script evaluation.
    pub fn set_items(&self, items: HashMap<String, Value>) {
        lock(&self.state).items = items;
    }

    /// Item links reported by the main page's initial link scan.
    pub fn set_initial_links(&self, links: Vec<String>) {
        lock(&self.state).initial_links = links;
    }

    /// Make the next `count` navigations fail.
    pub fn fail_next_navigations(&self, count: usize) {
        lock(&self.state).fail_navigations = count;
    }

    /// Delay every resumed fixture's response by `delay`, simulating a
    /// slow round-trip. A response whose page closes before the delay
    /// elapses is never delivered.
    pub fn set_response_delay(&self, delay: Duration) {
        lock(&self.state).response_delay = delay;
    }

    pub fn launches(&self) -> usize {
        lock(&self.state).launches
    }

    pub fn decisions(&self) -> Vec<Decision> {
        lock(&self.state).decisions.clone()
    }

    pub fn goto_urls(&self) -> Vec<String> {
        lock(&self.state).goto_urls.clone()
    }

    pub fn typed(&self) -> Vec<String> {
        lock(&self.state).typed.clone()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self, _config: &LaunchConfig) -> BrowserResult<Arc<dyn Browser>> {
        lock(&self.state).launches += 1;
        Ok(Arc::new(MockBrowser {
            state: self.state.clone(),
        }))
    }
}

pub struct MockBrowser {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_page(&self) -> BrowserResult<Arc<dyn Page>> {
        Ok(Arc::new(MockPage {
            state: self.state.clone(),
            request_cb: Mutex::new(None),
            response_cb: Mutex::new(None),
            interception: AtomicBool::new(false),
            closed: Arc::new(AtomicBool::new(false)),
            last_goto: Mutex::new(String::new()),
        }))
    }

    async fn close(&self) -> BrowserResult<()> {
        Ok(())
    }

    fn is_disconnected(&self) -> bool {
        false
    }
}

pub struct MockPage {
    state: Arc<Mutex<MockState>>,
    request_cb: Mutex<Option<RequestCallback>>,
    response_cb: Mutex<Option<ResponseCallback>>,
    interception: AtomicBool,
    closed: Arc<AtomicBool>,
    last_goto: Mutex<String>,
}

impl MockPage {
    /// Serve the current fixture through the interception path. The
    /// cursor advances optimistically; an abort rolls it back so the
    /// fixture is emitted again on the next stimulation.
    fn emit_fixture(&self) {
        let (fixture, index) = {
            let mut state = lock(&self.state);
            if state.cursor >= state.fixtures.len() {
                return;
            }
            let index = state.cursor;
            state.cursor += 1;
            (state.fixtures[index].clone(), index)
        };
        let Some(request_cb) = lock(&self.request_cb).clone() else {
            lock(&self.state).cursor = index;
            return;
        };

        let (request, decision) =
            InterceptedRequest::new(fixture.url.clone(), fixture.headers.clone());
        request_cb(request);

        let state = self.state.clone();
        let response_cb = lock(&self.response_cb).clone();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            match decision.await {
                Ok(RequestDecision::Resume(overrides)) => {
                    let delay = lock(&state).response_delay;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let url = overrides
                        .as_ref()
                        .and_then(|o| o.url.clone())
                        .unwrap_or_else(|| fixture.url.clone());
                    lock(&state).decisions.push(Decision::Continued {
                        url: url.clone(),
                        overrides,
                    });
                    // A page that went down mid-flight never hears back
                    if closed.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Some(response_cb) = response_cb {
                        response_cb(InterceptedResponse::new(url, fixture.body));
                    }
                }
                Ok(RequestDecision::Abort) => {
                    let mut state = lock(&state);
                    state.decisions.push(Decision::Aborted { url: fixture.url });
                    state.cursor = index;
                }
                // Request dropped without a decision
                Err(_) => lock(&state).cursor = index,
            }
        });
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        {
            let mut state = lock(&self.state);
            state.goto_urls.push(url.to_string());
            if state.fail_navigations > 0 {
                state.fail_navigations -= 1;
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    source: "scripted navigation failure".into(),
                });
            }
        }
        *lock(&self.last_goto) = url.to_string();

        // An item page's own document request goes through interception
        if self.interception.load(Ordering::SeqCst) {
            if let Some(request_cb) = lock(&self.request_cb).clone() {
                let (request, decision) = InterceptedRequest::new(url, HashMap::new());
                request_cb(request);
                tokio::spawn(async move {
                    let _ = decision.await;
                });
            }
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<Value> {
        if script == LINK_SCAN_SCRIPT {
            let state = lock(&self.state);
            return Ok(Value::Array(
                state
                    .initial_links
                    .iter()
                    .map(|link| Value::String(link.clone()))
                    .collect(),
            ));
        }
        if script == ITEM_DATA_SCRIPT {
            let visited = lock(&self.last_goto).clone();
            let shortcode = visited
                .split("/p/")
                .nth(1)
                .unwrap_or("")
                .trim_end_matches('/')
                .to_string();
            return lock(&self.state)
                .items
                .get(&shortcode)
                .cloned()
                .ok_or_else(|| {
                    BrowserError::Evaluate(format!("no scripted item for {shortcode}"))
                });
        }
        Ok(Value::Null)
    }

    async fn press_key(&self, _key: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn move_mouse(&self, _x: u32, _y: u32) -> BrowserResult<()> {
        self.emit_fixture();
        Ok(())
    }

    async fn click(&self, _selector: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        lock(&self.state).typed.push(text.to_string());
        self.emit_fixture();
        Ok(())
    }

    fn viewport(&self) -> (u32, u32) {
        (1920, 1080)
    }

    async fn set_request_interception(&self, enabled: bool) -> BrowserResult<()> {
        self.interception.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn on_request(&self, callback: RequestCallback) {
        *lock(&self.request_cb) = Some(callback);
    }

    fn on_response(&self, callback: ResponseCallback) {
        *lock(&self.response_cb) = Some(callback);
    }

    fn on_request_failed(&self, _callback: RequestFailedCallback) {}

    fn on_dialog(&self, _callback: DialogCallback) {}

    fn on_page_error(&self, _callback: PageErrorCallback) {}

    async fn close(&self) -> BrowserResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A well-formed hashtag feed page carrying the given ids.
pub fn hashtag_feed_body(ids: &[&str], has_next_page: bool) -> String {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "node": {
                    "id": id,
                    "shortcode": format!("sc-{id}"),
                    "owner": {"id": format!("owner-{id}")},
                    "is_video": false,
                    "taken_at_timestamp": 1_700_000_000,
                }
            })
        })
        .collect();
    json!({
        "data": {"hashtag": {"edge_hashtag_to_media": {
            "page_info": {
                "has_next_page": has_next_page,
                "end_cursor": if has_next_page {
                    Value::String("cursor-next".to_string())
                } else {
                    Value::Null
                },
            },
            "edges": edges,
        }}},
        "status": "ok",
    })
    .to_string()
}

/// The body a rate-limited API returns.
pub fn rate_limited_body() -> String {
    json!({"status": "fail", "message": "rate limited"}).to_string()
}

/// A small search response.
pub fn search_result_body() -> String {
    json!({
        "users": [{"user": {"username": "nasa"}}],
        "places": [],
        "hashtags": [{"hashtag": {"name": "sunset"}}],
        "has_more": false,
        "rank_token": "rank-1",
        "status": "ok",
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_served_on_resume() {
        let launcher = MockLauncher::with_fixtures(vec![Fixture::api("p0", "{}")]);
        let browser = launcher
            .launch(&LaunchConfig::default())
            .await
            .expect("launch");
        let page = browser.new_page().await.expect("page");

        let served: Arc<Mutex<Vec<InterceptedRequest>>> = Arc::default();
        let responses: Arc<Mutex<Vec<InterceptedResponse>>> = Arc::default();
        {
            let served = served.clone();
            page.on_request(Arc::new(move |request| {
                served.lock().unwrap().push(request);
            }));
            let responses = responses.clone();
            page.on_response(Arc::new(move |response| {
                responses.lock().unwrap().push(response);
            }));
        }

        page.move_mouse(1, 1).await.expect("stimulate");
        let request = served.lock().unwrap().pop().expect("request emitted");
        assert_eq!(request.url, Fixture::api_url("p0"));
        request.resume(None);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(responses.lock().unwrap().len(), 1);
        assert_eq!(launcher.launches(), 1);
        assert!(matches!(
            launcher.decisions().as_slice(),
            [Decision::Continued { overrides: None, .. }]
        ));
    }
}
