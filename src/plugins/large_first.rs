//! Requests larger pages from the API.
//!
//! The feed normally pages in small increments. This plugin raises the
//! page size carried in the GraphQL `variables` query parameter and
//! retunes the jump size so that one stimulation covers the larger
//! page.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::warn;
use url::Url;

use crate::traits::browser::{RequestOverrides, RequestSnapshot};
use crate::traits::plugin::{HookContext, Plugin, Tunables};

const PAGE_SIZE: u64 = 50;
const JUMP_SIZE: u32 = 150;

/// Rewrites paginated API requests to ask for [`PAGE_SIZE`] items per
/// page.
#[derive(Debug, Default)]
pub struct LargeFirst;

#[async_trait]
impl Plugin for LargeFirst {
    fn on_construction(&self, tunables: &Tunables) {
        tunables.set_jump_size(JUMP_SIZE);
    }

    async fn on_request(
        &self,
        request: &RequestSnapshot,
        overrides: &Mutex<RequestOverrides>,
        context: &HookContext,
    ) {
        if !context.endpoint.matches_api_url(&request.url) {
            return;
        }
        match rewrite_page_size(&request.url) {
            Some(url) => {
                let mut slot = overrides.lock().unwrap_or_else(|e| e.into_inner());
                slot.url = Some(url);
            }
            None => warn!(url = %request.url, "request carried no rewritable variables"),
        }
    }
}

/// Rewrite the `first` field inside the `variables` query parameter.
/// Returns `None` when the parameter is absent or not valid JSON.
fn rewrite_page_size(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let variables = url
        .query_pairs()
        .find(|(name, _)| name == "variables")
        .map(|(_, value)| value.into_owned())?;
    let mut parsed: serde_json::Value = serde_json::from_str(&variables).ok()?;
    parsed.as_object_mut()?.insert("first".to_string(), PAGE_SIZE.into());

    let mut rewritten = url.clone();
    rewritten
        .query_pairs_mut()
        .clear()
        .extend_pairs(url.query_pairs().map(|(name, value)| {
            if name == "variables" {
                (name.into_owned(), parsed.to_string())
            } else {
                (name.into_owned(), value.into_owned())
            }
        }));
    Some(rewritten.into())
}
