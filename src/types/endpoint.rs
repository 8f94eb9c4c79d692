//! Endpoint descriptors for the supported feed types.
//!
//! The per-endpoint variants differ only in their URL template and the
//! two extraction paths into the paginated API payload, so they are
//! plain data rather than separate engine types.

/// Describes one scrapeable feed: where to navigate, which network
/// requests belong to its API, and where in the response payload the
/// pagination indicator and the item list live.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL the main page navigates to; the resource id is appended.
    pub base_url: String,

    /// Resource identifier (hashtag name, location id, username, ...).
    pub id: String,

    /// Dotted path to the `page_info` object in API payloads.
    pub page_info_path: String,

    /// Dotted path to the edge list in API payloads.
    pub edges_path: String,

    /// Prefix identifying this feed's API requests.
    pub api_url_prefix: String,

    /// Base URL for visiting an individual item page.
    pub item_url_prefix: String,
}

impl Endpoint {
    const GRAPHQL_PREFIX: &'static str = "https://www.instagram.com/graphql/query";
    const ITEM_PREFIX: &'static str = "https://instagram.com/p/";

    /// A hashtag feed.
    pub fn hashtag(id: impl Into<String>) -> Self {
        Self {
            base_url: "https://instagram.com/explore/tags/".to_string(),
            id: id.into(),
            page_info_path: "data.hashtag.edge_hashtag_to_media.page_info".to_string(),
            edges_path: "data.hashtag.edge_hashtag_to_media.edges".to_string(),
            api_url_prefix: Self::GRAPHQL_PREFIX.to_string(),
            item_url_prefix: Self::ITEM_PREFIX.to_string(),
        }
    }

    /// A location feed.
    pub fn location(id: impl Into<String>) -> Self {
        Self {
            base_url: "https://instagram.com/explore/locations/".to_string(),
            id: id.into(),
            page_info_path: "data.location.edge_location_to_media.page_info".to_string(),
            edges_path: "data.location.edge_location_to_media.edges".to_string(),
            api_url_prefix: Self::GRAPHQL_PREFIX.to_string(),
            item_url_prefix: Self::ITEM_PREFIX.to_string(),
        }
    }

    /// A user timeline feed.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            base_url: "https://instagram.com/".to_string(),
            id: id.into(),
            page_info_path: "data.user.edge_owner_to_timeline_media.page_info".to_string(),
            edges_path: "data.user.edge_owner_to_timeline_media.edges".to_string(),
            api_url_prefix: Self::GRAPHQL_PREFIX.to_string(),
            item_url_prefix: Self::ITEM_PREFIX.to_string(),
        }
    }

    /// A single item page, for direct fetches. No pagination paths.
    pub fn post(shortcode: impl Into<String>) -> Self {
        Self {
            base_url: Self::ITEM_PREFIX.to_string(),
            id: shortcode.into(),
            page_info_path: String::new(),
            edges_path: String::new(),
            api_url_prefix: Self::GRAPHQL_PREFIX.to_string(),
            item_url_prefix: Self::ITEM_PREFIX.to_string(),
        }
    }

    /// The search surface. No pagination paths; responses are matched
    /// by a different API prefix and consumed whole.
    pub fn search() -> Self {
        Self {
            base_url: "https://instagram.com/explore/tags/".to_string(),
            id: "instagram".to_string(),
            page_info_path: String::new(),
            edges_path: String::new(),
            api_url_prefix: "https://www.instagram.com/web/".to_string(),
            item_url_prefix: Self::ITEM_PREFIX.to_string(),
        }
    }

    /// A custom endpoint, for sources other than the built-ins.
    pub fn custom(
        base_url: impl Into<String>,
        id: impl Into<String>,
        page_info_path: impl Into<String>,
        edges_path: impl Into<String>,
        api_url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            id: id.into(),
            page_info_path: page_info_path.into(),
            edges_path: edges_path.into(),
            api_url_prefix: api_url_prefix.into(),
            item_url_prefix: Self::ITEM_PREFIX.to_string(),
        }
    }

    /// Override the per-item page prefix.
    pub fn with_item_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.item_url_prefix = prefix.into();
        self
    }

    /// The absolute URL of the main page for this feed.
    pub fn page_url(&self) -> String {
        format!("{}{}", self.base_url, self.id)
    }

    /// The URL of an individual item page.
    pub fn item_url(&self, shortcode: &str) -> String {
        format!("{}{}", self.item_url_prefix, shortcode)
    }

    /// Whether a request/response URL belongs to this feed's API.
    ///
    /// Story-reel side traffic shares the GraphQL prefix but is not
    /// part of the feed, so it is excluded.
    pub fn matches_api_url(&self, url: &str) -> bool {
        url.starts_with(&self.api_url_prefix) && !url.contains("include_reel")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_urls() {
        assert_eq!(
            Endpoint::hashtag("sunset").page_url(),
            "https://instagram.com/explore/tags/sunset"
        );
        assert_eq!(
            Endpoint::location("12345").page_url(),
            "https://instagram.com/explore/locations/12345"
        );
        assert_eq!(Endpoint::user("nasa").page_url(), "https://instagram.com/nasa");
    }

    #[test]
    fn test_api_url_matching() {
        let endpoint = Endpoint::hashtag("sunset");
        assert!(endpoint.matches_api_url(
            "https://www.instagram.com/graphql/query?query_hash=abc"
        ));
        assert!(!endpoint.matches_api_url("https://www.instagram.com/static/bundle.js"));
        // Reel traffic shares the prefix but is excluded
        assert!(!endpoint.matches_api_url(
            "https://www.instagram.com/graphql/query?include_reel=true"
        ));
    }

    #[test]
    fn test_item_url() {
        let endpoint = Endpoint::hashtag("sunset");
        assert_eq!(endpoint.item_url("Bx1"), "https://instagram.com/p/Bx1");
    }
}
