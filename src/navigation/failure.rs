//! Provisional load failures
//!
//! Decides what a frame shows after a navigation fails: nothing at all, a blank
//! document, or a styled error page. Failures are values here; they only ever reach the
//! coordinator as notifications.

use crate::config::PolicyConfig;
use crate::engine::{EmbedderHooks, LoadSource};
use crate::error::{NavigationErrorKind, NetErrorCode};
use crate::types::scheme;
use url::Url;

const ERROR_PAGE_MIME_TYPE: &str = "text/html";
const ERROR_PAGE_CHARSET: &str = "UTF-8";

/// A navigation that could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub code: NetErrorCode,
    pub url: Url,
    pub stale_copy_in_cache: bool,
}

impl LoadError {
    pub fn new(code: NetErrorCode, url: Url) -> Self {
        Self {
            code,
            url,
            stale_copy_in_cache: false,
        }
    }

    pub fn kind(&self) -> NavigationErrorKind {
        self.code.kind()
    }
}

/// What the frame does in response to a failed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResponse {
    /// Stop loading without committing anything.
    Silent,
    /// Commit an empty document.
    BlankDocument,
    /// Commit the embedder's error page.
    ErrorPage,
}

/// Classify `error`. The first matching rule wins.
pub fn classify(
    error: &LoadError,
    policy: &PolicyConfig,
    embedder: &dyn EmbedderHooks,
) -> FailureResponse {
    match error.code {
        NetErrorCode::Aborted => FailureResponse::Silent,
        NetErrorCode::BlockedByClient if policy.suppress_client_blocked_error_page => {
            FailureResponse::Silent
        }
        _ if embedder.should_suppress_error_page(&error.url) => FailureResponse::Silent,
        NetErrorCode::BlockedByResponse => FailureResponse::BlankDocument,
        _ => FailureResponse::ErrorPage,
    }
}

/// Whether the error document replaces the current history entry: reloads and history
/// loads, reloads of the URL already loading, and explicit replacements.
pub fn replaces_current_entry(
    is_reload: bool,
    failed_url: &Url,
    loading_url: Option<&Url>,
    should_replace_current_entry: bool,
) -> bool {
    is_reload || loading_url == Some(failed_url) || should_replace_current_entry
}

/// The document to load for `response`. Returns `None` for [`FailureResponse::Silent`].
pub fn error_document(
    error: &LoadError,
    response: FailureResponse,
    embedder: &dyn EmbedderHooks,
) -> Option<LoadSource> {
    match response {
        FailureResponse::Silent => None,
        FailureResponse::BlankDocument => Some(LoadSource::Data {
            data: Vec::new(),
            mime_type: ERROR_PAGE_MIME_TYPE.to_string(),
            charset: ERROR_PAGE_CHARSET.to_string(),
            base_url: scheme::blank_data_url(),
            unreachable_url: None,
        }),
        FailureResponse::ErrorPage => Some(LoadSource::Data {
            data: embedder.error_page_html(error).into_bytes(),
            mime_type: ERROR_PAGE_MIME_TYPE.to_string(),
            charset: ERROR_PAGE_CHARSET.to_string(),
            base_url: scheme::unreachable_document_url(),
            unreachable_url: Some(error.url.clone()),
        }),
    }
}
