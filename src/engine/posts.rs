//! Direct fetch of named items.
//!
//! Instead of paginating a feed, this runner visits a given list of
//! item pages and returns their full payloads. It shares the engine's
//! session handling and per-item fetch path; there is no stimulation
//! and no pagination.

use std::sync::Arc;

use crate::error::Result;
use crate::traits::browser::Launcher;
use crate::traits::validator::full_item_shape;
use crate::types::config::ScrapeOptions;
use crate::types::endpoint::Endpoint;
use crate::types::record::Record;

use super::{ScrapeControl, ScrapeEngine};

/// A one-shot run over a fixed set of item shortcodes.
pub struct Posts {
    engine: ScrapeEngine,
    shortcodes: Vec<String>,
}

impl Posts {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        shortcodes: Vec<String>,
        options: ScrapeOptions,
    ) -> Self {
        let first = shortcodes.first().cloned().unwrap_or_default();
        let engine = ScrapeEngine::new(launcher, Endpoint::post(first), options)
            .with_validator(Arc::new(full_item_shape()));
        Self { engine, shortcodes }
    }

    pub fn control(&self) -> ScrapeControl {
        self.engine.control()
    }

    /// Fetch every named item. Items whose fetch exhausts its retries
    /// are dropped, as in full-detail feed mode.
    pub async fn get(&mut self) -> Result<Vec<Record>> {
        self.engine.start().await?;
        for shortcode in &self.shortcodes {
            if self.engine.seen_shortcodes.insert(shortcode.clone()) {
                self.engine.pending_shortcodes.push(shortcode.clone());
            }
        }
        let outcome = self.engine.fetch_pending_items().await;
        if outcome.is_err() {
            self.engine.control().force_stop();
        }
        self.engine.shutdown().await;
        outcome?;
        Ok(std::mem::take(&mut self.engine.pending_records).into())
    }
}
