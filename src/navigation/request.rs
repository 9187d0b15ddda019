//! Navigation request state and the parameter sets exchanged with the coordinator.

use crate::history::HistoryEntry;
use crate::types::{scheme, Disposition, RequestId};
use bitflags::bitflags;
use std::collections::HashMap;
use std::time::Instant;
use url::Url;

/// Core classification of how a navigation came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionCore {
    Link,
    Typed,
    AutoBookmark,
    AutoSubframe,
    ManualSubframe,
    Generated,
    AutoToplevel,
    FormSubmit,
    Reload,
    Keyword,
}

bitflags! {
    /// Qualifiers OR'd onto a [`TransitionCore`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransitionQualifiers: u32 {
        const FORWARD_BACK = 1 << 0;
        const FROM_ADDRESS_BAR = 1 << 1;
        const HOME_PAGE = 1 << 2;
        const CLIENT_REDIRECT = 1 << 3;
        const SERVER_REDIRECT = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageTransition {
    pub core: TransitionCore,
    pub qualifiers: TransitionQualifiers,
}

impl PageTransition {
    pub fn new(core: TransitionCore) -> Self {
        Self {
            core,
            qualifiers: TransitionQualifiers::empty(),
        }
    }

    pub fn with(mut self, qualifiers: TransitionQualifiers) -> Self {
        self.qualifiers |= qualifiers;
        self
    }

    /// Transitions that only make sense for a top-level document.
    pub fn is_main_frame(&self) -> bool {
        !matches!(
            self.core,
            TransitionCore::AutoSubframe | TransitionCore::ManualSubframe
        )
    }

    pub fn is_client_redirect(&self) -> bool {
        self.qualifiers.contains(TransitionQualifiers::CLIENT_REDIRECT)
    }
}

impl Default for PageTransition {
    fn default() -> Self {
        Self::new(TransitionCore::Link)
    }
}

/// Coordinator classification of a navigation to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationType {
    Reload,
    ReloadBypassingCache,
    ReloadOriginalRequestUrl,
    Restore,
    RestoreWithPost,
    HistorySameDocument,
    HistoryDifferentDocument,
    SameDocument,
    DifferentDocument,
}

impl NavigationType {
    pub fn is_reload(&self) -> bool {
        matches!(
            self,
            NavigationType::Reload
                | NavigationType::ReloadBypassingCache
                | NavigationType::ReloadOriginalRequestUrl
        )
    }

    pub fn is_same_document(&self) -> bool {
        matches!(
            self,
            NavigationType::SameDocument | NavigationType::HistorySameDocument
        )
    }
}

/// What content was doing when it asked to navigate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationCause {
    LinkClicked,
    FormSubmitted,
    BackForward,
    Reload,
    FormResubmitted,
    /// Script-driven and anything not covered above.
    Other,
}

/// Whether a request starts a new entry, reloads, or walks session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    NewNavigation,
    Reload,
    BackForward,
}

/// Which side started the navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    Coordinator,
    Content,
}

/// Parameters common to every coordinator-driven navigation.
#[derive(Debug, Clone)]
pub struct CommonNavigationParams {
    pub url: Url,
    pub referrer: Option<Url>,
    pub transition: PageTransition,
    pub navigation_type: NavigationType,
    pub should_replace_current_entry: bool,
    pub base_url_for_data_url: Option<Url>,
    pub history_url_for_data_url: Option<Url>,
    pub method: String,
    pub post_data: Option<Vec<u8>>,
    pub navigation_start: Option<Instant>,
}

impl CommonNavigationParams {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            referrer: None,
            transition: PageTransition::default(),
            navigation_type: NavigationType::DifferentDocument,
            should_replace_current_entry: false,
            base_url_for_data_url: None,
            history_url_for_data_url: None,
            method: "GET".to_string(),
            post_data: None,
            navigation_start: None,
        }
    }
}

/// Session-history and bookkeeping parameters for a coordinator-driven navigation.
#[derive(Debug, Clone)]
pub struct RequestNavigationParams {
    pub redirects: Vec<Url>,
    pub original_url: Option<Url>,
    pub original_method: Option<String>,
    /// History entry to restore; present for session history navigations.
    pub page_state: Option<Vec<u8>>,
    pub nav_entry_id: i32,
    pub is_history_navigation_in_new_child: bool,
    /// Unique names of child frames the coordinator holds entries for, mapped to
    /// whether that entry is just the initial empty document.
    pub subframe_unique_names: HashMap<String, bool>,
    pub intended_as_new_entry: bool,
    pub pending_history_list_offset: i32,
    pub current_history_list_offset: i32,
    pub current_history_list_length: i32,
    pub is_view_source: bool,
    pub should_clear_history_list: bool,
    pub has_user_gesture: bool,
    pub has_committed_real_load: bool,
}

impl Default for RequestNavigationParams {
    fn default() -> Self {
        Self {
            redirects: Vec::new(),
            original_url: None,
            original_method: None,
            page_state: None,
            nav_entry_id: 0,
            is_history_navigation_in_new_child: false,
            subframe_unique_names: HashMap::new(),
            intended_as_new_entry: false,
            pending_history_list_offset: -1,
            current_history_list_offset: -1,
            current_history_list_length: 0,
            is_view_source: false,
            should_clear_history_list: false,
            has_user_gesture: false,
            has_committed_real_load: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationParams {
    pub common: CommonNavigationParams,
    pub request: RequestNavigationParams,
}

impl NavigationParams {
    pub fn new(url: Url) -> Self {
        Self {
            common: CommonNavigationParams::new(url),
            request: RequestNavigationParams::default(),
        }
    }

    /// Session history navigation to `entry`, as sent by the coordinator for back and
    /// forward.
    pub fn history(url: Url, entry: &HistoryEntry, nav_entry_id: i32, pending_offset: i32) -> Self {
        let mut params = Self::new(url);
        params.common.navigation_type = NavigationType::HistoryDifferentDocument;
        params.common.transition = PageTransition::new(TransitionCore::Link)
            .with(TransitionQualifiers::FORWARD_BACK);
        params.request.page_state = Some(entry.as_bytes().to_vec());
        params.request.nav_entry_id = nav_entry_id;
        params.request.pending_history_list_offset = pending_offset;
        params
    }

    pub fn is_history_navigation(&self) -> bool {
        self.request.page_state.is_some()
    }
}

/// A navigation requested by content running inside the frame.
#[derive(Debug, Clone)]
pub struct LocalNavigationRequest {
    pub url: Url,
    pub method: String,
    pub body: Option<Vec<u8>>,
    pub referrer: Option<Url>,
    pub cause: NavigationCause,
    /// Disposition the engine would use if nothing intervenes.
    pub disposition: Disposition,
    pub has_user_gesture: bool,
    pub is_redirect: bool,
    pub is_client_redirect: bool,
    pub replaces_current_history_item: bool,
    pub is_history_navigation_in_new_child: bool,
    /// False when this request is the re-entry of a navigation the coordinator already
    /// handled.
    pub check_for_coordinator_navigation: bool,
}

impl LocalNavigationRequest {
    pub fn new(url: Url, cause: NavigationCause) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            body: None,
            referrer: None,
            cause,
            disposition: Disposition::CurrentTab,
            has_user_gesture: false,
            is_redirect: false,
            is_client_redirect: false,
            replaces_current_history_item: false,
            is_history_navigation_in_new_child: false,
            check_for_coordinator_navigation: true,
        }
    }

    /// A user clicking a link in the frame.
    pub fn link(url: Url) -> Self {
        let mut request = Self::new(url, NavigationCause::LinkClicked);
        request.has_user_gesture = true;
        request
    }

    /// Script assigning a new location.
    pub fn script(url: Url) -> Self {
        Self::new(url, NavigationCause::Other)
    }

    pub fn post(url: Url, body: Vec<u8>) -> Self {
        let mut request = Self::new(url, NavigationCause::FormSubmitted);
        request.method = "POST".to_string();
        request.body = Some(body);
        request
    }

    pub fn transition(&self) -> PageTransition {
        let core = match self.cause {
            NavigationCause::FormSubmitted | NavigationCause::FormResubmitted => {
                TransitionCore::FormSubmit
            }
            NavigationCause::Reload => TransitionCore::Reload,
            _ => TransitionCore::Link,
        };
        let mut transition = PageTransition::new(core);
        if self.is_client_redirect {
            transition = transition.with(TransitionQualifiers::CLIENT_REDIRECT);
        }
        if self.cause == NavigationCause::BackForward {
            transition = transition.with(TransitionQualifiers::FORWARD_BACK);
        }
        transition
    }
}

/// One navigation attempt in flight. At most one exists per frame.
#[derive(Debug, Clone)]
pub struct NavigationRequestState {
    pub request_id: RequestId,
    pub url: Url,
    pub referrer: Option<Url>,
    pub method: String,
    pub body: Option<Vec<u8>>,
    pub kind: RequestKind,
    pub history_snapshot: Option<HistoryEntry>,
    pub redirects: Vec<Url>,
    pub navigation_start: Instant,
    pub source: RequestSource,
    pub transition: PageTransition,
    pub has_user_gesture: bool,
    pub should_replace_current_entry: bool,
    pub is_client_redirect: bool,
    /// Full coordinator parameters, kept for commit bookkeeping.
    pub coordinator_params: Option<NavigationParams>,
}

impl NavigationRequestState {
    /// Pending state for a coordinator-driven navigation. `local_start` is when this
    /// process first saw it; the coordinator's start is never allowed to be later.
    pub fn from_coordinator(
        params: NavigationParams,
        history_snapshot: Option<HistoryEntry>,
        local_start: Instant,
    ) -> Self {
        let kind = if params.common.navigation_type.is_reload() {
            RequestKind::Reload
        } else if params.is_history_navigation() {
            RequestKind::BackForward
        } else {
            RequestKind::NewNavigation
        };
        Self {
            request_id: RequestId::next(),
            url: params.common.url.clone(),
            referrer: params.common.referrer.clone(),
            method: params.common.method.clone(),
            body: params.common.post_data.clone(),
            kind,
            history_snapshot,
            redirects: params.request.redirects.clone(),
            navigation_start: sanitize_navigation_start(params.common.navigation_start, local_start),
            source: RequestSource::Coordinator,
            transition: params.common.transition,
            has_user_gesture: params.request.has_user_gesture,
            should_replace_current_entry: params.common.should_replace_current_entry,
            is_client_redirect: params.common.transition.is_client_redirect(),
            coordinator_params: Some(params),
        }
    }

    /// Pending state for a navigation content decided to run locally.
    pub fn from_content(request: &LocalNavigationRequest, now: Instant) -> Self {
        let kind = match request.cause {
            NavigationCause::Reload => RequestKind::Reload,
            NavigationCause::BackForward => RequestKind::BackForward,
            _ => RequestKind::NewNavigation,
        };
        Self {
            request_id: RequestId::next(),
            url: request.url.clone(),
            referrer: request.referrer.clone(),
            method: request.method.clone(),
            body: request.body.clone(),
            kind,
            history_snapshot: None,
            redirects: Vec::new(),
            navigation_start: now,
            source: RequestSource::Content,
            transition: request.transition(),
            has_user_gesture: request.has_user_gesture,
            should_replace_current_entry: request.replaces_current_history_item,
            is_client_redirect: request.is_client_redirect,
            coordinator_params: None,
        }
    }

    pub fn is_coordinator_initiated(&self) -> bool {
        self.source == RequestSource::Coordinator && !scheme::is_javascript(&self.url)
    }

    pub fn is_redirect(&self) -> bool {
        !self.redirects.is_empty()
    }

    /// The URL the navigation originally asked for, before any redirects.
    pub fn original_request_url(&self) -> &Url {
        self.redirects.first().unwrap_or(&self.url)
    }

    pub fn is_reload(&self) -> bool {
        self.kind == RequestKind::Reload
    }

    pub fn nav_entry_id(&self) -> i32 {
        self.coordinator_params
            .as_ref()
            .map(|p| p.request.nav_entry_id)
            .unwrap_or(0)
    }

    pub fn intended_as_new_entry(&self) -> bool {
        self.coordinator_params
            .as_ref()
            .map(|p| p.request.intended_as_new_entry)
            .unwrap_or(false)
    }
}

/// The earlier of the coordinator-reported and locally observed start times.
pub fn sanitize_navigation_start(coordinator: Option<Instant>, local: Instant) -> Instant {
    match coordinator {
        Some(start) if start < local => start,
        _ => local,
    }
}
