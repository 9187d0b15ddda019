//! Core Types
//!
//! Identifiers shared by every component, plus the URL classification helpers used by
//! the dispatch policy and failure handling.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Coordinator-allocated identifier for a local frame or a remote placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Opaque handle for a node in the document engine's frame tree.
///
/// Handles are minted by [`crate::registry::FrameRegistry`] and never reused within a
/// registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeHandle(pub(crate) u64);

impl TreeHandle {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Caller-visible identifier correlating an asynchronous coordinator round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        RequestId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Where a navigation should be displayed, as requested by content or policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    CurrentTab,
    NewForegroundTab,
    NewBackgroundTab,
    NewWindow,
    NewPopup,
    Download,
    Ignore,
}

/// URL scheme helpers.
pub mod scheme {
    use url::Url;

    pub const ABOUT_BLANK: &str = "about:blank";
    /// Base URL for committed error pages.
    pub const UNREACHABLE_DOCUMENT_URL: &str = "data:text/html,chromewebdata";
    /// Document loaded in place of a response blocked by policy.
    pub const BLANK_DATA_URL: &str = "data:,";

    pub fn is_about(url: &Url) -> bool {
        url.scheme() == "about"
    }

    pub fn is_about_blank(url: &Url) -> bool {
        is_about(url) && url.path() == "blank"
    }

    pub fn is_file(url: &Url) -> bool {
        url.scheme() == "file"
    }

    pub fn is_data(url: &Url) -> bool {
        url.scheme() == "data"
    }

    pub fn is_javascript(url: &Url) -> bool {
        url.scheme() == "javascript"
    }

    /// Whether loading `url` requires a network fetch (as opposed to a document the
    /// engine can synthesize locally).
    pub fn needs_network_request(url: &Url) -> bool {
        !(is_about(url) || is_data(url) || is_javascript(url))
    }

    pub fn about_blank() -> Url {
        Url::parse(ABOUT_BLANK).expect("about:blank is a valid URL")
    }

    pub fn unreachable_document_url() -> Url {
        Url::parse(UNREACHABLE_DOCUMENT_URL).expect("error page base URL is valid")
    }

    pub fn blank_data_url() -> Url {
        Url::parse(BLANK_DATA_URL).expect("blank data URL is valid")
    }
}

/// Serialized origin of `url`, or `"null"` for opaque origins.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
