//! The plugin hook surface.
//!
//! Plugins observe and steer a run without forking the engine: they
//! can retune jump behaviour at construction, rewrite outgoing API
//! requests, and watch responses, fetched items, and graft cycles.
//! All hooks have no-op defaults, so a plugin implements only what it
//! needs.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::browser::{InterceptedResponse, Page, RequestOverrides, RequestSnapshot};
use crate::types::endpoint::Endpoint;

/// Run parameters plugins may retune while the engine runs.
#[derive(Debug)]
pub struct Tunables {
    /// "Scroll to end" key presses per stimulation.
    pub jump_size: AtomicU32,
    /// Stimulations between graft cycles.
    pub jump_mod: AtomicU32,
}

impl Tunables {
    pub fn new(jump_size: u32, jump_mod: u32) -> Self {
        Self {
            jump_size: AtomicU32::new(jump_size),
            jump_mod: AtomicU32::new(jump_mod),
        }
    }

    pub fn jump_size(&self) -> u32 {
        self.jump_size.load(Ordering::Relaxed)
    }

    pub fn jump_mod(&self) -> u32 {
        self.jump_mod.load(Ordering::Relaxed)
    }

    pub fn set_jump_size(&self, jump_size: u32) {
        self.jump_size.store(jump_size, Ordering::Relaxed);
    }
}

/// What a hook can see of the engine: the current page (absent before
/// the first session is up), the tunables, and the endpoint being
/// scraped. Owned clones, so hooks can run concurrently with the loop.
#[derive(Clone)]
pub struct HookContext {
    pub page: Option<Arc<dyn Page>>,
    pub tunables: Arc<Tunables>,
    pub endpoint: Endpoint,
}

/// Observer hooks over the engine lifecycle.
///
/// Request hooks share one overrides slot; the last write to a field
/// wins when several plugins touch it.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Called once, synchronously, before the engine starts. Runs in
    /// registration order.
    fn on_construction(&self, _tunables: &Tunables) {}

    /// Called after each browser session comes up and the main page
    /// has loaded.
    async fn on_browser_ready(&self, _context: &HookContext) {}

    /// Called with each matched API request before it is resumed.
    async fn on_request(
        &self,
        _request: &RequestSnapshot,
        _overrides: &Mutex<RequestOverrides>,
        _context: &HookContext,
    ) {
    }

    /// Called with each matched, parsed API response.
    async fn on_response(&self, _response: &InterceptedResponse, _context: &HookContext) {}

    /// Called with each full-detail item payload after fetching.
    async fn on_item_fetched(&self, _item: &Value, _context: &HookContext) {}

    /// Called when a graft cycle begins.
    async fn on_graft(&self, _context: &HookContext) {}
}

/// The registered plugins of one engine, dispatched together.
///
/// Async hooks run concurrently across plugins; construction hooks run
/// in order.
#[derive(Clone, Default)]
pub struct HookRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl HookRegistry {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn construction(&self, tunables: &Tunables) {
        for plugin in &self.plugins {
            plugin.on_construction(tunables);
        }
    }

    pub async fn browser_ready(&self, context: &HookContext) {
        join_all(self.plugins.iter().map(|p| p.on_browser_ready(context))).await;
    }

    pub async fn request(
        &self,
        request: &RequestSnapshot,
        overrides: &Mutex<RequestOverrides>,
        context: &HookContext,
    ) {
        join_all(
            self.plugins
                .iter()
                .map(|p| p.on_request(request, overrides, context)),
        )
        .await;
    }

    pub async fn response(&self, response: &InterceptedResponse, context: &HookContext) {
        join_all(self.plugins.iter().map(|p| p.on_response(response, context))).await;
    }

    pub async fn item_fetched(&self, item: &Value, context: &HookContext) {
        join_all(self.plugins.iter().map(|p| p.on_item_fetched(item, context))).await;
    }

    pub async fn graft(&self, context: &HookContext) {
        join_all(self.plugins.iter().map(|p| p.on_graft(context))).await;
    }
}
