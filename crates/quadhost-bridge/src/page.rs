//! Page location bridge: URL, query parameters, fragment and history.
//!
//! The bridge owns the page's current location and its history stack.
//! Parameter and fragment writes rewrite the visible URL by pushing a new
//! history entry; they never produce a navigation. Opening a link is the
//! only navigation, and it is queued as a [`LinkRequest`] for the embedder.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::form_urlencoded;
use url::Url;

use crate::error::{BridgeError, Result};

/// Where a link should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    /// Replace the current page
    SameTab,
    /// Open alongside the current page
    NewTab,
}

/// A navigation requested by the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    /// URL as given by the guest
    pub url: String,
    /// Requested target
    pub target: LinkTarget,
}

/// Current page location plus the query snapshots indexed by the guest.
#[derive(Debug)]
pub struct PageBridge {
    location: Url,
    history: Vec<Url>,
    query_snapshot: Vec<(String, String)>,
    startup_params: Vec<(String, String)>,
    link_requests: Vec<LinkRequest>,
}

impl PageBridge {
    /// Open the page at `url`. Query parameters present now are the
    /// startup parameters.
    pub fn new(url: &str) -> Result<Self> {
        let location = Url::parse(url)?;
        let startup_params = query_pairs(&location);
        Ok(Self {
            history: vec![location.clone()],
            location,
            query_snapshot: Vec::new(),
            startup_params,
            link_requests: Vec::new(),
        })
    }

    /// Full URL.
    pub fn href(&self) -> &str {
        self.location.as_str()
    }

    /// Origin and path, without query or fragment.
    pub fn origin_path(&self) -> String {
        format!(
            "{}{}",
            self.location.origin().ascii_serialization(),
            self.location.path()
        )
    }

    /// `href` when `full`, otherwise `origin_path`.
    pub fn path(&self, full: bool) -> String {
        if full {
            self.href().to_string()
        } else {
            self.origin_path()
        }
    }

    /// Current location.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Every location the page has had, oldest first.
    pub fn history(&self) -> &[Url] {
        &self.history
    }

    /// Snapshot the current query parameters and return their count.
    ///
    /// [`query_key`](Self::query_key) and [`query_value`](Self::query_value)
    /// index this snapshot until the next call.
    pub fn snapshot_query(&mut self) -> usize {
        self.query_snapshot = query_pairs(&self.location);
        self.query_snapshot.len()
    }

    /// Key of the `index`-th snapshotted parameter.
    pub fn query_key(&self, index: i32) -> Result<&str> {
        entry(&self.query_snapshot, index).map(|(k, _)| k.as_str())
    }

    /// Value of the `index`-th snapshotted parameter.
    pub fn query_value(&self, index: i32) -> Result<&str> {
        entry(&self.query_snapshot, index).map(|(_, v)| v.as_str())
    }

    /// Number of parameters present when the page was opened.
    pub fn startup_param_count(&self) -> usize {
        self.startup_params.len()
    }

    /// Key of the `index`-th startup parameter.
    pub fn startup_key(&self, index: i32) -> Result<&str> {
        entry(&self.startup_params, index).map(|(k, _)| k.as_str())
    }

    /// Value of the `index`-th startup parameter.
    pub fn startup_value(&self, index: i32) -> Result<&str> {
        entry(&self.startup_params, index).map(|(_, v)| v.as_str())
    }

    /// Set a query parameter, replacing every existing occurrence.
    pub fn set_query_param(&mut self, name: &str, value: &str) {
        let mut pairs = query_pairs(&self.location);
        match pairs.iter().position(|(k, _)| k == name) {
            Some(first) => {
                pairs[first].1 = value.to_string();
                let mut idx = 0;
                pairs.retain(|(k, _)| {
                    let keep = idx <= first || k != name;
                    idx += 1;
                    keep
                });
            }
            None => pairs.push((name.to_string(), value.to_string())),
        }
        self.push_location(Some(serialize_query(&pairs)), None);
    }

    /// Remove every occurrence of a query parameter.
    pub fn delete_query_param(&mut self, name: &str) {
        let mut pairs = query_pairs(&self.location);
        pairs.retain(|(k, _)| k != name);
        self.push_location(Some(serialize_query(&pairs)), None);
    }

    /// Fragment including the leading `#`, or empty when there is none.
    pub fn hash(&self) -> String {
        match self.location.fragment() {
            Some(f) if !f.is_empty() => format!("#{}", f),
            _ => String::new(),
        }
    }

    /// Replace the fragment. An empty string removes it; one leading `#`
    /// is accepted so a value read with [`hash`](Self::hash) round-trips.
    pub fn set_hash(&mut self, hash: &str) {
        let hash = hash.strip_prefix('#').unwrap_or(hash);
        self.push_location(None, Some(hash.to_string()));
    }

    /// Queue a navigation for the embedder.
    pub fn open_link(&mut self, url: &str, target: LinkTarget) {
        info!(url, ?target, "link open requested");
        self.link_requests.push(LinkRequest {
            url: url.to_string(),
            target,
        });
    }

    /// Navigations queued so far, without consuming them.
    pub fn link_requests(&self) -> &[LinkRequest] {
        &self.link_requests
    }

    /// Take the queued navigations.
    pub fn take_link_requests(&mut self) -> Vec<LinkRequest> {
        std::mem::take(&mut self.link_requests)
    }

    /// Rewrite query and/or fragment and push the result onto the history.
    /// `None` keeps the current part; an empty string removes it.
    fn push_location(&mut self, query: Option<String>, fragment: Option<String>) {
        let mut next = self.location.clone();
        if let Some(query) = query {
            next.set_query((!query.is_empty()).then_some(query.as_str()));
        }
        if let Some(fragment) = fragment {
            next.set_fragment((!fragment.is_empty()).then_some(fragment.as_str()));
        }
        debug!(url = next.as_str(), "history entry pushed");
        self.history.push(next.clone());
        self.location = next;
    }
}

fn query_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn serialize_query(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn entry(pairs: &[(String, String)], index: i32) -> Result<&(String, String)> {
    usize::try_from(index)
        .ok()
        .and_then(|i| pairs.get(i))
        .ok_or(BridgeError::IndexOutOfRange {
            index: i64::from(index),
            len: pairs.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://example.com/app/index.html?level=3&name=quad#intro";

    #[test]
    fn test_paths() {
        let page = PageBridge::new(PAGE).unwrap();
        assert_eq!(page.path(true), PAGE);
        assert_eq!(page.path(false), "https://example.com/app/index.html");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(PageBridge::new("not a url"), Err(BridgeError::InvalidUrl(_))));
    }

    #[test]
    fn test_query_snapshot() {
        let mut page = PageBridge::new(PAGE).unwrap();
        assert_eq!(page.snapshot_query(), 2);
        assert_eq!(page.query_key(0).unwrap(), "level");
        assert_eq!(page.query_value(0).unwrap(), "3");
        assert_eq!(page.query_key(1).unwrap(), "name");
        assert!(matches!(
            page.query_key(2),
            Err(BridgeError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(page.query_value(-1).is_err());
    }

    #[test]
    fn test_snapshot_is_stable_until_next_count() {
        let mut page = PageBridge::new(PAGE).unwrap();
        page.snapshot_query();
        page.delete_query_param("level");

        assert_eq!(page.query_key(0).unwrap(), "level");
        assert_eq!(page.snapshot_query(), 1);
        assert_eq!(page.query_key(0).unwrap(), "name");
    }

    #[test]
    fn test_set_param_rewrites_url_without_navigation() {
        let mut page = PageBridge::new(PAGE).unwrap();
        page.set_query_param("level", "4");
        page.set_query_param("mode", "hard mode");

        assert_eq!(
            page.href(),
            "https://example.com/app/index.html?level=4&name=quad&mode=hard+mode#intro"
        );
        assert_eq!(page.history().len(), 3);
        assert!(page.link_requests().is_empty());
    }

    #[test]
    fn test_set_param_collapses_duplicates() {
        let mut page = PageBridge::new("http://localhost/?a=1&b=2&a=3").unwrap();
        page.set_query_param("a", "9");
        assert_eq!(page.href(), "http://localhost/?a=9&b=2");
    }

    #[test]
    fn test_delete_last_param_drops_query() {
        let mut page = PageBridge::new("http://localhost/game?seed=1").unwrap();
        page.delete_query_param("seed");
        assert_eq!(page.href(), "http://localhost/game");
    }

    #[test]
    fn test_startup_params_are_fixed() {
        let mut page = PageBridge::new(PAGE).unwrap();
        page.set_query_param("extra", "1");

        assert_eq!(page.startup_param_count(), 2);
        assert_eq!(page.startup_key(1).unwrap(), "name");
        assert_eq!(page.startup_value(1).unwrap(), "quad");
    }

    #[test]
    fn test_hash_round_trip() {
        let mut page = PageBridge::new(PAGE).unwrap();
        assert_eq!(page.hash(), "#intro");

        page.set_hash("chapter-2");
        assert_eq!(page.hash(), "#chapter-2");
        assert!(page.href().ends_with("?level=3&name=quad#chapter-2"));

        let current = page.hash();
        page.set_hash(&current);
        assert_eq!(page.hash(), "#chapter-2");

        page.set_hash("");
        assert_eq!(page.hash(), "");
        assert_eq!(page.href(), "https://example.com/app/index.html?level=3&name=quad");
    }

    #[test]
    fn test_open_link_is_queued() {
        let mut page = PageBridge::new(PAGE).unwrap();
        page.open_link("https://docs.rs", LinkTarget::NewTab);
        page.open_link("/home", LinkTarget::SameTab);

        let requests = page.take_link_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].target, LinkTarget::NewTab);
        assert_eq!(requests[1].url, "/home");
        assert!(page.link_requests().is_empty());
        assert_eq!(page.href(), PAGE);
    }
}
