//! Document engine and embedder collaborators
//!
//! The navigation core never parses, renders or executes content itself. It drives a
//! [`DocumentEngine`] through synchronous callouts and consults [`EmbedderHooks`] for
//! embedder-specific policy. Every callout that may run script receives an
//! [`EngineScope`], the only way back into the session while the callout is running.

use crate::error::InvariantViolation;
use crate::history::HistoryEntry;
use crate::navigation::failure::LoadError;
use crate::registry::FrameRegistry;
use crate::session::{DetachInitiator, DetachKind, SessionCore};
use crate::types::FrameId;
use tracing::warn;
use url::Url;

/// How the engine should treat the load with respect to session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoadType {
    Standard,
    ReplaceCurrentItem,
    Reload,
    ReloadBypassingCache,
    BackForward,
    InitialHistoryLoad,
}

/// Whether a history load stays inside the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoadType {
    SameDocument,
    DifferentDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    UseProtocolCachePolicy,
    ValidatingCacheData,
    BypassingCache,
}

/// What the engine should load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    /// Fetch `url`.
    Url {
        url: Url,
        method: String,
        body: Option<Vec<u8>>,
        referrer: Option<Url>,
    },
    /// Load an in-memory document.
    Data {
        data: Vec<u8>,
        mime_type: String,
        charset: String,
        base_url: Url,
        unreachable_url: Option<Url>,
    },
}

/// A request handed to [`DocumentEngine::load_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub source: LoadSource,
    pub load_type: FrameLoadType,
    pub history_load_type: HistoryLoadType,
    /// Entry to restore for history loads.
    pub history_entry: Option<HistoryEntry>,
    pub cache_policy: CachePolicy,
    pub is_client_redirect: bool,
}

impl LoadRequest {
    pub fn new(source: LoadSource, load_type: FrameLoadType) -> Self {
        Self {
            source,
            load_type,
            history_load_type: HistoryLoadType::DifferentDocument,
            history_entry: None,
            cache_policy: CachePolicy::UseProtocolCachePolicy,
            is_client_redirect: false,
        }
    }

    /// The URL the load is for: the fetched URL, or the base URL of a data load.
    pub fn url(&self) -> &Url {
        match &self.source {
            LoadSource::Url { url, .. } => url,
            LoadSource::Data { base_url, .. } => base_url,
        }
    }
}

/// History classification of a commit, decided by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitType {
    /// A new session history entry.
    Standard,
    BackForward,
    InitialHistory,
    /// No effect on session history.
    HistoryInert,
}

impl CommitType {
    /// The commit type an engine reports for a load of `load_type`.
    pub fn for_load(load_type: FrameLoadType) -> Self {
        match load_type {
            FrameLoadType::Standard => CommitType::Standard,
            FrameLoadType::BackForward => CommitType::BackForward,
            FrameLoadType::InitialHistoryLoad => CommitType::InitialHistory,
            FrameLoadType::ReplaceCurrentItem
            | FrameLoadType::Reload
            | FrameLoadType::ReloadBypassingCache => CommitType::HistoryInert,
        }
    }
}

/// A document the engine committed.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCommit {
    pub url: Url,
    pub origin: String,
    pub mime_type: String,
    pub http_status: u16,
    /// The entry describing the new document; becomes the frame's current entry.
    pub entry: HistoryEntry,
    pub commit_type: CommitType,
    pub base_url: Option<Url>,
    pub was_within_same_document: bool,
    /// Set when the committed document is an error page for this URL.
    pub unreachable_url: Option<Url>,
}

/// Result of [`DocumentEngine::load_document`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Committed(DocumentCommit),
    Failed(LoadError),
    /// Still loading. The engine reports the result later through
    /// `NavigationSession::complete_load` or `NavigationSession::fail_provisional_load`.
    Pending,
}

/// The document/layout/script engine hosting frame content.
pub trait DocumentEngine {
    fn load_document(
        &mut self,
        frame: FrameId,
        request: &LoadRequest,
        scope: &mut EngineScope<'_>,
    ) -> LoadOutcome;

    /// Runs the "confirm navigation away" hook. `true` means proceed.
    fn run_unload_confirmation(
        &mut self,
        frame: FrameId,
        is_reload: bool,
        scope: &mut EngineScope<'_>,
    ) -> bool;

    fn run_before_detach_hook(&mut self, frame: FrameId, scope: &mut EngineScope<'_>);

    fn stop_loading(&mut self, frame: FrameId, scope: &mut EngineScope<'_>);

    fn current_document_url(&self, frame: FrameId) -> Option<Url>;

    /// Lets the frame's owner show fallback content instead of an error page.
    fn render_fallback_content(&mut self, _frame: FrameId, _error: &LoadError) -> bool {
        false
    }
}

/// Embedder answer to [`EmbedderHooks::should_fork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkDecision {
    pub send_referrer: bool,
}

/// Embedder-specific policy.
pub trait EmbedderHooks {
    fn should_fork(
        &self,
        _url: &Url,
        _method: &str,
        _is_initial_navigation: bool,
        _is_redirect: bool,
    ) -> Option<ForkDecision> {
        None
    }

    fn should_suppress_error_page(&self, _url: &Url) -> bool {
        false
    }

    fn error_page_html(&self, error: &LoadError) -> String {
        format!(
            "<!doctype html><title>{}</title><p>{} could not be loaded: {}</p>",
            error.url, error.url, error.code
        )
    }
}

/// Embedder with no opinions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEmbedder;

impl EmbedderHooks for DefaultEmbedder {}

/// Re-entry capability handed to engine callouts.
///
/// Script running inside a callout may detach frames (including the one being called
/// out for) or flag engine-side state. Anything that violates a session invariant
/// poisons the session; the caller observes that as soon as the callout returns.
pub struct EngineScope<'a> {
    core: &'a mut SessionCore,
}

impl<'a> EngineScope<'a> {
    pub(crate) fn new(core: &'a mut SessionCore) -> Self {
        Self { core }
    }

    pub fn registry(&self) -> &FrameRegistry {
        &self.core.registry
    }

    /// Whether `frame` is still a registered local frame.
    pub fn is_alive(&self, frame: FrameId) -> bool {
        self.core.registry.local(frame).is_some()
    }

    /// Detach `frame` as if its owner element were removed by script. Returns whether a
    /// frame was actually detached.
    pub fn detach_frame(&mut self, frame: FrameId) -> bool {
        match self
            .core
            .detach(frame, DetachKind::Remove, DetachInitiator::Content)
        {
            Ok(detached) => detached,
            Err(violation) => {
                self.poison(violation);
                false
            }
        }
    }

    pub fn schedule_client_redirect(&mut self, frame: FrameId) {
        self.core.schedule_client_redirect(frame);
    }

    pub fn did_access_initial_document(&mut self, frame: FrameId) {
        self.core.did_access_initial_document(frame);
    }

    fn poison(&mut self, violation: InvariantViolation) {
        warn!(error = %violation, "Invariant violated during engine callout");
        self.core.poison(violation);
    }
}
