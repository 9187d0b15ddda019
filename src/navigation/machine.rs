//! Navigation State Machine
//!
//! Drives one local frame through `Idle -> Provisional -> Committed`, with `Failed` as
//! the detour a provisional navigation takes on its way to an error page or back to
//! `Idle`. Navigations enter from two sides: content asks through
//! [`NavigationSession::begin_local_navigation`] and is routed by the dispatch policy,
//! the coordinator asks through `StartNavigation`/`CommitNavigation`. Either way the
//! frame holds at most one [`NavigationRequestState`] and the engine reports the result
//! synchronously or later through [`NavigationSession::complete_load`] and
//! [`NavigationSession::fail_provisional_load`].
//!
//! Every engine callout runs under a liveness guard taken beforehand; once the callout
//! returns, nothing touches the frame unless the guard still reports it alive.

use crate::engine::{
    CachePolicy, CommitType, DocumentCommit, DocumentEngine, EmbedderHooks, EngineScope,
    ForkDecision, FrameLoadType, HistoryLoadType, LoadOutcome, LoadRequest, LoadSource,
};
use crate::error::{NetErrorCode, SessionError};
use crate::frame::FramePhase;
use crate::history::{ExpectedChildEntry, HistoryEntry};
use crate::navigation::failure::{self, FailureResponse, LoadError};
use crate::navigation::policy::{
    self, ForkReason, FrameFacts, PolicyDecision, PolicyEnvironment, PolicyInput, UnloadVerdict,
};
use crate::navigation::request::{
    LocalNavigationRequest, NavigationCause, NavigationParams, NavigationRequestState,
    NavigationType, PageTransition, RequestKind, TransitionCore, TransitionQualifiers,
};
use crate::protocol::{BeginNavigationParams, CommitNotification, HostMessage, OpenUrlParams};
use crate::session::{NavigationSession, SessionCore};
use crate::swap::SwapController;
use crate::types::{origin_of, scheme, Disposition, FrameId, RequestId};
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::{Position, Url};

/// `net::ERR_INVALID_URL`
const ERR_INVALID_URL: i32 = -300;

/// What became of a navigation content asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    LoadedLocally,
    Forked(ForkReason),
    HistoryLoadRequested,
    BeganCoordinatorNavigation,
    OpenedExternally(Disposition),
    Suppressed,
    /// The frame was destroyed while the navigation was being decided.
    FrameDetached,
    /// Not a local frame of this session.
    UnknownFrame,
}

/// Policy side effects for one frame of a session.
struct FramePolicyEnv<'a> {
    core: &'a mut SessionCore,
    engine: &'a mut dyn DocumentEngine,
    embedder: &'a dyn EmbedderHooks,
    frame: FrameId,
}

impl PolicyEnvironment for FramePolicyEnv<'_> {
    fn take_expected_child(&mut self, unique_name: &str) -> Option<ExpectedChildEntry> {
        let parent = self.core.registry.parent_of(self.frame)?;
        self.core
            .registry
            .local_mut(parent)?
            .history
            .take_expected_child(unique_name)
    }

    fn cancel_initial_history_load(&mut self) {
        self.core
            .send(self.frame, HostMessage::CancelInitialHistoryLoad);
    }

    fn run_unload_confirmation(&mut self, is_reload: bool) -> UnloadVerdict {
        let Some(guard) = self.core.registry.liveness(self.frame) else {
            return UnloadVerdict::FrameGone;
        };
        let proceed = {
            let mut scope = EngineScope::new(self.core);
            self.engine
                .run_unload_confirmation(self.frame, is_reload, &mut scope)
        };
        if !guard.is_alive() {
            return UnloadVerdict::FrameGone;
        }
        if !proceed {
            return UnloadVerdict::Cancel;
        }
        if let Some(pending) = self
            .core
            .registry
            .local_mut(self.frame)
            .and_then(|frame| frame.pending.as_mut())
        {
            pending.navigation_start = Instant::now();
        }
        UnloadVerdict::Proceed
    }

    fn embedder_should_fork(
        &self,
        url: &Url,
        method: &str,
        is_initial_navigation: bool,
        is_redirect: bool,
    ) -> Option<ForkDecision> {
        self.embedder
            .should_fork(url, method, is_initial_navigation, is_redirect)
    }
}

impl NavigationSession {
    /// Content inside `frame` asked to navigate (link click, script, form submission).
    pub fn begin_local_navigation(
        &mut self,
        frame: FrameId,
        request: LocalNavigationRequest,
    ) -> Result<DispatchOutcome, SessionError> {
        self.ensure_usable()?;
        self.dispatch(frame, request, false)
    }

    /// Coordinator asks the frame to navigate and fetch the document itself.
    pub fn start_navigation(
        &mut self,
        frame: FrameId,
        params: NavigationParams,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.navigate(frame, params, false)
    }

    /// Coordinator asks the frame to commit a navigation it already fetched. A pending
    /// swap-in happens before anything is loaded.
    pub fn commit_navigation(
        &mut self,
        frame: FrameId,
        params: NavigationParams,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.navigate(frame, params, true)
    }

    /// The engine committed the frame's provisional navigation.
    pub fn complete_load(
        &mut self,
        frame: FrameId,
        commit: DocumentCommit,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.finish_commit(frame, commit)
    }

    /// The engine could not complete the frame's provisional navigation.
    pub fn fail_provisional_load(
        &mut self,
        frame: FrameId,
        error: LoadError,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.handle_engine_failure(frame, error)
    }

    /// A navigation that stays inside the current document (fragment change, history
    /// API). Any provisional navigation in flight is left pending.
    pub fn navigate_within_document(
        &mut self,
        frame: FrameId,
        mut commit: DocumentCommit,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let Some(local) = self.core.registry.local_mut(frame) else {
            debug!(frame_id = %frame, "Same-document navigation for unknown frame");
            return Ok(());
        };
        let request = LocalNavigationRequest::new(commit.url.clone(), NavigationCause::Other);
        let saved_pending = local
            .pending
            .replace(NavigationRequestState::from_content(&request, Instant::now()));
        let saved_phase = local.phase;
        let saved_awaiting = local.awaiting_coordinator_commit;

        commit.was_within_same_document = true;
        self.finish_commit(frame, commit)?;

        if let Some(pending) = saved_pending {
            if let Some(local) = self.core.registry.local_mut(frame) {
                local.pending = Some(pending);
                local.phase = saved_phase;
                local.awaiting_coordinator_commit = saved_awaiting;
            }
        }
        Ok(())
    }

    /// Coordinator-side failure of a navigation it was fetching for this frame.
    pub fn failed_navigation(
        &mut self,
        frame: FrameId,
        params: NavigationParams,
        error_code: NetErrorCode,
        has_stale_copy_in_cache: bool,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let Some(local) = self.core.registry.local(frame) else {
            debug!(frame_id = %frame, "Failed navigation for unknown frame");
            return Ok(());
        };
        let loading_url = local
            .pending
            .as_ref()
            .map(|pending| pending.url.clone())
            .or_else(|| self.engine.current_document_url(frame))
            .or_else(|| local.last_committed_url.clone());

        self.prepare_for_navigation(frame, &params)?;

        let error = LoadError {
            code: error_code,
            url: params.common.url.clone(),
            stale_copy_in_cache: has_stale_copy_in_cache,
        };
        info!(frame_id = %frame, url = %error.url, code = %error.code, "Coordinator navigation failed");

        let Some(source) = self.resolve_failure(frame, &error) else {
            return Ok(());
        };

        let replace = failure::replaces_current_entry(
            params.common.navigation_type.is_reload(),
            &error.url,
            loading_url.as_ref(),
            params.common.should_replace_current_entry,
        );
        let history_entry = params
            .request
            .page_state
            .clone()
            .and_then(|bytes| HistoryEntry::from_bytes(bytes).ok());
        let content_initiated = params.request.nav_entry_id == 0;

        let pending =
            NavigationRequestState::from_coordinator(params, history_entry.clone(), Instant::now());
        self.enter_provisional(frame, pending);
        if let Some(local) = self.core.registry.local_mut(frame) {
            local.awaiting_coordinator_commit = false;
        }
        if content_initiated {
            self.report_failure(frame, &error);
        }
        self.load_error_document(frame, source, replace, history_entry)
    }

    /// Abort a provisional navigation without treating it as a failure.
    pub fn stop(&mut self, frame: FrameId) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let Some(guard) = self.core.registry.liveness(frame) else {
            return Ok(());
        };
        if self.core.registry.local(frame).is_none() {
            return Ok(());
        }
        {
            let mut scope = EngineScope::new(&mut self.core);
            self.engine.stop_loading(frame, &mut scope);
        }
        self.core.check()?;
        if !guard.is_alive() {
            debug!(frame_id = %frame, "Frame detached while stopping");
            return Ok(());
        }

        let in_flight = self
            .core
            .registry
            .local(frame)
            .map(|local| local.phase == FramePhase::Provisional || local.awaiting_coordinator_commit)
            .unwrap_or(false);
        if in_flight {
            let was_loading = self.settle_idle(frame);
            self.core.notify(|observer| observer.on_stop(frame));
            if was_loading {
                self.core.send(frame, HostMessage::StopLoading);
            }
            info!(frame_id = %frame, "Provisional navigation stopped");
        }
        Ok(())
    }

    /// Run the confirmation hook on the coordinator's behalf and report the verdict.
    pub fn before_unload(&mut self, frame: FrameId, is_reload: bool) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let start = Instant::now();
        if self.core.registry.local(frame).is_none() {
            debug!(frame_id = %frame, "Before-unload for unknown frame");
            return Ok(());
        }
        let guard = self.core.registry.liveness(frame);
        let proceed = {
            let mut scope = EngineScope::new(&mut self.core);
            self.engine
                .run_unload_confirmation(frame, is_reload, &mut scope)
        };
        self.core.check()?;
        let end = Instant::now();
        if !guard.map(|g| g.is_alive()).unwrap_or(false) {
            debug!(frame_id = %frame, "Frame detached during before-unload");
        }
        self.core
            .send(frame, HostMessage::BeforeUnloadAck { proceed, start, end });
        Ok(())
    }

    /// Reload the frame's current document through the dispatch policy.
    pub fn reload(&mut self, frame: FrameId, bypass_cache: bool) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let Some(local) = self.core.registry.local(frame) else {
            return Ok(());
        };
        let url = local
            .last_committed_url
            .clone()
            .or_else(|| self.engine.current_document_url(frame));
        let Some(url) = url else {
            debug!(frame_id = %frame, "Nothing to reload");
            return Ok(());
        };
        let request = LocalNavigationRequest::new(url, NavigationCause::Reload);
        self.dispatch(frame, request, bypass_cache).map(|_| ())
    }

    fn dispatch(
        &mut self,
        frame: FrameId,
        request: LocalNavigationRequest,
        bypass_cache: bool,
    ) -> Result<DispatchOutcome, SessionError> {
        let Some(local) = self.core.registry.local(frame) else {
            debug!(frame_id = %frame, "Navigation request for unknown frame");
            return Ok(DispatchOutcome::UnknownFrame);
        };
        let counters = self.core.counters;
        let facts = FrameFacts {
            is_top_level: self.core.registry.parent_of(frame).is_none(),
            unique_name: local.replicated.unique_name.clone(),
            old_url: local
                .last_committed_url
                .clone()
                .unwrap_or_else(scheme::about_blank),
            view_source_mode: local.view_source_mode,
            privileged_bindings: self.core.bindings.is_privileged(),
            history_length: counters.length(),
            back_count: counters.back_count(),
            forward_count: counters.forward_count(),
            has_opener: local.opener.is_some(),
            has_user_visible_state: local.has_user_visible_state(),
        };
        let is_content_initiated = !local.is_coordinator_initiated();
        let is_redirect = request.is_redirect
            || local
                .pending
                .as_ref()
                .map(NavigationRequestState::is_redirect)
                .unwrap_or(false);
        let guard = self.core.registry.liveness(frame);
        let config = self.core.config.policy.clone();

        let decision = {
            let mut env = FramePolicyEnv {
                core: &mut self.core,
                engine: self.engine.as_mut(),
                embedder: self.embedder.as_ref(),
                frame,
            };
            let input = PolicyInput {
                request: &request,
                is_content_initiated,
                is_redirect,
            };
            policy::decide(input, &facts, &config, &mut env)
        };
        self.core.check()?;
        if !guard.map(|g| g.is_alive()).unwrap_or(false) {
            debug!(frame_id = %frame, "Frame detached while deciding navigation policy");
            return Ok(DispatchOutcome::FrameDetached);
        }

        match decision {
            PolicyDecision::OpenViaCoordinator { params, reason } => {
                info!(frame_id = %frame, url = %params.url, ?reason, "Navigation forked to coordinator");
                self.core.send(frame, HostMessage::OpenUrl(params));
                Ok(DispatchOutcome::Forked(reason))
            }
            PolicyDecision::HistoryLoadInNewChild(params) => {
                debug!(frame_id = %frame, url = %params.url, "Requesting history entry for new child frame");
                self.core.send(frame, HostMessage::OpenUrl(params));
                self.mark_loading(frame);
                Ok(DispatchOutcome::HistoryLoadRequested)
            }
            PolicyDecision::Suppress => {
                debug!(frame_id = %frame, url = %request.url, "Navigation suppressed");
                Ok(DispatchOutcome::Suppressed)
            }
            PolicyDecision::BeginCoordinatorNavigation => {
                let params = BeginNavigationParams {
                    request_id: RequestId::next(),
                    url: request.url.clone(),
                    method: request.method.clone(),
                    body: request.body.clone(),
                    referrer: request.referrer.clone(),
                    transition: request.transition(),
                    has_user_gesture: request.has_user_gesture,
                    is_form_submission: request.cause == NavigationCause::FormSubmitted,
                    navigation_start: Instant::now(),
                };
                info!(frame_id = %frame, url = %params.url, request_id = %params.request_id, "Navigation handed to coordinator");
                if let Some(local) = self.core.registry.local_mut(frame) {
                    local.awaiting_coordinator_commit = true;
                }
                self.core.send(frame, HostMessage::BeginNavigation(params));
                self.mark_loading(frame);
                Ok(DispatchOutcome::BeganCoordinatorNavigation)
            }
            PolicyDecision::OpenExternally(disposition) => {
                let message = match disposition {
                    Disposition::Download => HostMessage::DownloadUrl {
                        url: request.url.clone(),
                        referrer: request.referrer.clone(),
                    },
                    _ => HostMessage::OpenUrl(OpenUrlParams {
                        url: request.url.clone(),
                        referrer: request.referrer.clone(),
                        disposition,
                        should_replace_current_entry: false,
                        user_gesture: request.has_user_gesture,
                        uses_post: request.method.eq_ignore_ascii_case("POST"),
                        body: request.body.clone(),
                        is_history_navigation_in_new_child: false,
                    }),
                };
                debug!(frame_id = %frame, url = %request.url, ?disposition, "Opening navigation externally");
                self.core.send(frame, message);
                Ok(DispatchOutcome::OpenedExternally(disposition))
            }
            PolicyDecision::ProceedLocally => {
                self.load_locally(frame, &request, bypass_cache)?;
                Ok(DispatchOutcome::LoadedLocally)
            }
        }
    }

    fn load_locally(
        &mut self,
        frame: FrameId,
        request: &LocalNavigationRequest,
        bypass_cache: bool,
    ) -> Result<(), SessionError> {
        let (load_type, cache_policy) = match request.cause {
            NavigationCause::Reload if bypass_cache => {
                (FrameLoadType::ReloadBypassingCache, CachePolicy::BypassingCache)
            }
            NavigationCause::Reload => (FrameLoadType::Reload, CachePolicy::ValidatingCacheData),
            NavigationCause::BackForward => {
                (FrameLoadType::BackForward, CachePolicy::UseProtocolCachePolicy)
            }
            _ if request.replaces_current_history_item => (
                FrameLoadType::ReplaceCurrentItem,
                CachePolicy::UseProtocolCachePolicy,
            ),
            _ => (FrameLoadType::Standard, CachePolicy::UseProtocolCachePolicy),
        };
        let load = LoadRequest {
            source: LoadSource::Url {
                url: request.url.clone(),
                method: request.method.clone(),
                body: request.body.clone(),
                referrer: request.referrer.clone(),
            },
            load_type,
            history_load_type: HistoryLoadType::DifferentDocument,
            history_entry: None,
            cache_policy,
            is_client_redirect: request.is_client_redirect,
        };
        info!(frame_id = %frame, url = %request.url, ?load_type, "Loading locally");
        self.enter_provisional(frame, NavigationRequestState::from_content(request, Instant::now()));
        self.load_and_settle(frame, load, false)
    }

    /// Shared body of `StartNavigation` and `CommitNavigation`.
    fn navigate(
        &mut self,
        frame: FrameId,
        params: NavigationParams,
        is_commit: bool,
    ) -> Result<(), SessionError> {
        let local_start = Instant::now();
        let Some(local) = self.core.registry.local(frame) else {
            debug!(frame_id = %frame, "Navigation for unknown frame");
            return Ok(());
        };
        if !local.in_frame_tree && local.placeholder.is_none() {
            warn!(frame_id = %frame, "Navigation for frame that is not attached");
            return Ok(());
        }
        let was_provisional = local.phase == FramePhase::Provisional;
        let client_redirect_scheduled = local.client_redirect_scheduled;
        let was_loading = local.is_loading;
        let current_entry = local.history.current_entry().cloned();
        let needs_swap = local.placeholder.is_some();

        if is_commit && needs_swap {
            let swapped = SwapController::new(&mut self.core).swap_in(frame);
            swapped.map_err(|v| self.core.fail(v))?;
        }

        self.prepare_for_navigation(frame, &params)?;

        let navigation_type = params.common.navigation_type;
        let mut is_reload = navigation_type.is_reload();
        let mut cache_policy = CachePolicy::UseProtocolCachePolicy;
        if is_reload && current_entry.is_none() {
            debug!(frame_id = %frame, "Reload without a current entry, loading normally");
            is_reload = false;
            cache_policy = CachePolicy::ValidatingCacheData;
        } else if navigation_type == NavigationType::ReloadBypassingCache {
            cache_policy = CachePolicy::BypassingCache;
        }
        if params.request.is_view_source {
            if let Some(local) = self.core.registry.local_mut(frame) {
                local.view_source_mode = true;
            }
        }

        let history_entry = match &params.request.page_state {
            Some(bytes) => match HistoryEntry::from_bytes(bytes.clone()) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(frame_id = %frame, error = %err, "Invalid history entry, navigation ignored");
                    return Ok(());
                }
            },
            None => None,
        };

        let mut load_type = if is_reload {
            match navigation_type {
                NavigationType::ReloadBypassingCache => FrameLoadType::ReloadBypassingCache,
                _ => FrameLoadType::Reload,
            }
        } else if params.common.should_replace_current_entry {
            FrameLoadType::ReplaceCurrentItem
        } else {
            FrameLoadType::Standard
        };
        let mut history_load_type = HistoryLoadType::DifferentDocument;

        if let Some(entry) = &history_entry {
            let in_new_child = params.request.is_history_navigation_in_new_child;
            load_type = if in_new_child {
                FrameLoadType::InitialHistoryLoad
            } else {
                FrameLoadType::BackForward
            };
            if let Some(local) = self.core.registry.local_mut(frame) {
                local
                    .history
                    .set_expected_children(params.request.subframe_unique_names.clone());
            }

            if navigation_type == NavigationType::HistorySameDocument {
                let same_document = current_entry
                    .as_ref()
                    .map(|current| current.same_document_as(entry))
                    .unwrap_or(false);
                if same_document {
                    history_load_type = HistoryLoadType::SameDocument;
                } else {
                    debug!(frame_id = %frame, "Same-document history load crosses documents, loading as new document");
                }
            }

            let interrupted_by_client_redirect =
                client_redirect_scheduled || was_provisional || current_entry.is_some();
            if in_new_child && interrupted_by_client_redirect {
                info!(frame_id = %frame, "Initial history load interrupted by client redirect");
                if !was_loading {
                    self.core.send(frame, HostMessage::StopLoading);
                }
                return Ok(());
            }
        }

        let url = params.common.url.clone();
        let data_source = params.common.base_url_for_data_url.clone().map(|base_url| {
            decode_data_url(&url).map(|payload| LoadSource::Data {
                data: payload.data,
                mime_type: payload.mime_type,
                charset: payload.charset,
                base_url,
                unreachable_url: params.common.history_url_for_data_url.clone(),
            })
        });
        let source = match data_source {
            Some(decoded) => decoded,
            None => Some(LoadSource::Url {
                url: url.clone(),
                method: params.common.method.clone(),
                body: params.common.post_data.clone(),
                referrer: params.common.referrer.clone(),
            }),
        };
        let is_client_redirect = params.common.transition.is_client_redirect();

        let pending =
            NavigationRequestState::from_coordinator(params, history_entry.clone(), local_start);
        self.enter_provisional(frame, pending);

        let Some(source) = source else {
            warn!(frame_id = %frame, url = %url, "Undecodable data URL");
            return self
                .handle_engine_failure(frame, LoadError::new(NetErrorCode::Other(ERR_INVALID_URL), url));
        };

        let load = LoadRequest {
            source,
            load_type,
            history_load_type,
            history_entry,
            cache_policy,
            is_client_redirect,
        };
        info!(frame_id = %frame, url = %url, ?load_type, is_commit, "Coordinator navigation");
        self.load_and_settle(frame, load, false)
    }

    /// Adopt the coordinator's history list view and other per-navigation state.
    fn prepare_for_navigation(
        &mut self,
        frame: FrameId,
        params: &NavigationParams,
    ) -> Result<(), SessionError> {
        let request = &params.request;
        self.core.counters.overwrite(
            request.current_history_list_offset,
            request.current_history_list_length,
        );
        if request.should_clear_history_list {
            let cleared = self.core.counters.reset_for_clear(
                request.current_history_list_offset,
                request.current_history_list_length,
            );
            cleared.map_err(|v| self.core.fail(v))?;
        }
        if request.has_committed_real_load && self.core.registry.parent_of(frame).is_some() {
            if let Some(local) = self.core.registry.local_mut(frame) {
                local.committed_first_real_load = true;
            }
        }
        Ok(())
    }

    /// Make `pending` the frame's only navigation in flight.
    fn enter_provisional(&mut self, frame: FrameId, pending: NavigationRequestState) {
        let Some(local) = self.core.registry.local_mut(frame) else {
            return;
        };
        let url = pending.url.clone();
        let was_provisional = local.phase == FramePhase::Provisional;
        if let Some(replaced) = local.pending.replace(pending) {
            debug!(frame_id = %frame, request_id = %replaced.request_id, "Pending navigation replaced");
        }
        local.phase = FramePhase::Provisional;
        let start_loading = !local.is_loading;
        local.is_loading = true;

        if start_loading {
            self.core.send(frame, HostMessage::StartLoading);
        }
        if !was_provisional {
            self.core
                .notify(|observer| observer.did_start_provisional_load(frame, &url));
        }
    }

    fn mark_loading(&mut self, frame: FrameId) {
        let Some(local) = self.core.registry.local_mut(frame) else {
            return;
        };
        if !local.is_loading {
            local.is_loading = true;
            self.core.send(frame, HostMessage::StartLoading);
        }
    }

    /// Drop the pending navigation and return to `Idle`. Returns whether the frame was
    /// loading.
    fn settle_idle(&mut self, frame: FrameId) -> bool {
        let Some(local) = self.core.registry.local_mut(frame) else {
            return false;
        };
        local.pending = None;
        local.phase = FramePhase::Idle;
        local.awaiting_coordinator_commit = false;
        std::mem::replace(&mut local.is_loading, false)
    }

    /// Hand `load` to the engine and act on the outcome if the frame survived.
    fn load_and_settle(
        &mut self,
        frame: FrameId,
        load: LoadRequest,
        is_error_page: bool,
    ) -> Result<(), SessionError> {
        let Some(guard) = self.core.registry.liveness(frame) else {
            return Ok(());
        };
        let outcome = {
            let mut scope = EngineScope::new(&mut self.core);
            self.engine.load_document(frame, &load, &mut scope)
        };
        self.core.check()?;
        if !guard.is_alive() {
            debug!(frame_id = %frame, "Frame detached while loading");
            return Ok(());
        }

        match outcome {
            LoadOutcome::Committed(commit) => self.finish_commit(frame, commit),
            LoadOutcome::Failed(error) if is_error_page => {
                warn!(frame_id = %frame, code = %error.code, "Error document failed to load");
                self.settle_idle(frame);
                self.core.send(frame, HostMessage::StopLoading);
                Ok(())
            }
            LoadOutcome::Failed(error) => self.handle_engine_failure(frame, error),
            LoadOutcome::Pending => Ok(()),
        }
    }

    fn finish_commit(&mut self, frame: FrameId, commit: DocumentCommit) -> Result<(), SessionError> {
        let Some(local) = self.core.registry.local(frame) else {
            debug!(frame_id = %frame, "Commit for unknown frame");
            return Ok(());
        };
        if !local.in_frame_tree && local.placeholder.is_none() {
            warn!(frame_id = %frame, "Commit for frame that is not attached");
            return Ok(());
        }
        if local.pending.is_none() {
            return Err(self
                .core
                .fail(crate::error::InvariantViolation::CommitWithoutPendingNavigation(frame)));
        }
        if local.placeholder.is_some() {
            let swapped = SwapController::new(&mut self.core).swap_in(frame);
            swapped.map_err(|v| self.core.fail(v))?;
        }

        if self.core.config.policy.enforce_origin_consistency && commit.unreachable_url.is_none() {
            let expected = origin_of(&commit.url);
            if expected != "null" && expected != commit.origin {
                return Err(self
                    .core
                    .fail(crate::error::InvariantViolation::OriginMismatch {
                        origin: commit.origin.clone(),
                        url: commit.url.to_string(),
                    }));
            }
        }

        let core = &mut self.core;
        let previous_entry = core
            .registry
            .local(frame)
            .and_then(|local| local.history.current_entry().cloned());
        if let Some(entry) = previous_entry {
            core.send(frame, HostMessage::UpdateState { entry });
        }

        let Some(local) = core.registry.local_mut(frame) else {
            return Ok(());
        };
        let Some(pending) = local.pending.take() else {
            return Ok(());
        };

        let same_document = commit.was_within_same_document;
        let did_create_new_entry = commit.commit_type == CommitType::Standard;
        let replace = pending.should_replace_current_entry;
        local.history.record_commit(
            commit.entry.clone(),
            did_create_new_entry && !same_document,
            replace,
            &mut core.counters,
        );
        let is_history_commit =
            !did_create_new_entry && commit.commit_type != CommitType::HistoryInert;
        if is_history_commit && pending.nav_entry_id() != 0 && !pending.intended_as_new_entry() {
            if let Some(params) = &pending.coordinator_params {
                core.counters
                    .adopt_offset(params.request.pending_history_list_offset);
            }
        }

        let transition = if local.is_main_frame {
            let base = if pending.transition.is_main_frame() {
                pending.transition
            } else {
                PageTransition::new(TransitionCore::Link)
            };
            if pending.is_client_redirect {
                base.with(TransitionQualifiers::CLIENT_REDIRECT)
            } else {
                base
            }
        } else if commit.commit_type == CommitType::Standard {
            PageTransition::new(TransitionCore::ManualSubframe)
        } else {
            PageTransition::new(TransitionCore::AutoSubframe)
        };

        let url_is_unreachable = commit.unreachable_url.is_some();
        let url = commit.unreachable_url.clone().unwrap_or_else(|| commit.url.clone());
        let history_list_was_cleared = pending
            .coordinator_params
            .as_ref()
            .map(|params| params.request.should_clear_history_list)
            .unwrap_or(false);
        let notification = CommitNotification {
            url: url.clone(),
            base_url: commit.base_url.clone(),
            origin: commit.origin.clone(),
            contents_mime_type: local.is_main_frame.then(|| commit.mime_type.clone()),
            http_status: commit.http_status,
            method: pending.method.clone(),
            transition,
            did_create_new_entry,
            should_replace_current_entry: replace,
            intended_as_new_entry: pending.intended_as_new_entry(),
            nav_entry_id: pending.nav_entry_id(),
            was_within_same_document: same_document,
            url_is_unreachable,
            redirects: pending.redirects.clone(),
            original_request_url: pending.original_request_url().clone(),
            should_update_history: !url_is_unreachable && commit.http_status != 404,
            unique_name: local.replicated.unique_name.clone(),
            item_sequence_number: commit.entry.item_sequence_number(),
            document_sequence_number: commit.entry.document_sequence_number(),
            history_list_was_cleared,
            referrer: pending.referrer.clone(),
            navigation_start: pending.navigation_start,
            entry: commit.entry,
        };

        local.phase = FramePhase::Committed;
        local.awaiting_coordinator_commit = false;
        local.client_redirect_scheduled = false;
        local.last_committed_url = Some(url.clone());

        core.notify(|observer| observer.did_commit_provisional_load(frame, &notification));
        info!(
            frame_id = %frame,
            url = %url,
            did_create_new_entry,
            offset = core.counters.offset(),
            length = core.counters.length(),
            "Navigation committed"
        );
        core.send(frame, HostMessage::DidCommit(Box::new(notification)));
        Ok(())
    }

    /// Engine-side failure of the frame's provisional navigation.
    fn handle_engine_failure(&mut self, frame: FrameId, error: LoadError) -> Result<(), SessionError> {
        let Some(pending) = self
            .core
            .registry
            .local(frame)
            .and_then(|local| local.pending.as_ref())
        else {
            debug!(frame_id = %frame, "Load failure without a provisional navigation");
            return Ok(());
        };
        let replace = failure::replaces_current_entry(
            pending.kind != RequestKind::NewNavigation,
            &error.url,
            None,
            pending.should_replace_current_entry,
        );
        info!(frame_id = %frame, url = %error.url, code = %error.code, kind = ?error.kind(), "Provisional load failed");

        self.report_failure(frame, &error);
        let Some(source) = self.resolve_failure(frame, &error) else {
            return Ok(());
        };
        self.load_error_document(frame, source, replace, None)
    }

    fn report_failure(&mut self, frame: FrameId, error: &LoadError) {
        if let Some(local) = self.core.registry.local_mut(frame) {
            local.phase = FramePhase::Failed;
        }
        self.core
            .notify(|observer| observer.did_fail_provisional_load(frame, error));
        self.core.send(
            frame,
            HostMessage::DidFailProvisionalLoad {
                error_code: error.code,
                url: error.url.clone(),
            },
        );
    }

    /// Handle failures that load nothing. Returns the error document to load otherwise.
    fn resolve_failure(&mut self, frame: FrameId, error: &LoadError) -> Option<LoadSource> {
        let response = failure::classify(error, &self.core.config.policy, self.embedder.as_ref());
        if response == FailureResponse::Silent {
            debug!(frame_id = %frame, code = %error.code, "Failure handled without error page");
            self.settle_idle(frame);
            self.core.send(frame, HostMessage::StopLoading);
            return None;
        }
        if self.engine.render_fallback_content(frame, error) {
            debug!(frame_id = %frame, "Owner rendered fallback content");
            if self.settle_idle(frame) {
                self.core.send(frame, HostMessage::StopLoading);
            }
            return None;
        }
        failure::error_document(error, response, self.embedder.as_ref())
    }

    fn load_error_document(
        &mut self,
        frame: FrameId,
        source: LoadSource,
        replace: bool,
        history_entry: Option<HistoryEntry>,
    ) -> Result<(), SessionError> {
        let Some(local) = self.core.registry.local_mut(frame) else {
            return Ok(());
        };
        local.view_source_mode = false;
        local.phase = FramePhase::Failed;
        if let Some(pending) = local.pending.as_mut() {
            pending.should_replace_current_entry = replace;
        }
        let load_type = if history_entry.is_some() {
            FrameLoadType::BackForward
        } else if replace {
            FrameLoadType::ReplaceCurrentItem
        } else {
            FrameLoadType::Standard
        };
        let load = LoadRequest {
            source,
            load_type,
            history_load_type: HistoryLoadType::DifferentDocument,
            history_entry,
            cache_policy: CachePolicy::UseProtocolCachePolicy,
            is_client_redirect: false,
        };
        self.load_and_settle(frame, load, true)
    }
}

/// Decoded payload of a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DataUrlPayload {
    mime_type: String,
    charset: String,
    data: Vec<u8>,
}

fn decode_data_url(url: &Url) -> Option<DataUrlPayload> {
    if !scheme::is_data(url) {
        return None;
    }
    let serialized = &url[Position::BeforePath..Position::AfterQuery];
    let (meta, body) = serialized.split_once(',')?;

    let mut mime_type = "text/plain".to_string();
    let mut charset = "US-ASCII".to_string();
    let mut is_base64 = false;
    for (index, part) in meta.split(';').enumerate() {
        let part = part.trim();
        if index == 0 {
            if !part.is_empty() {
                mime_type = part.to_ascii_lowercase();
            }
        } else if part.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else if let Some(value) = part.strip_prefix("charset=") {
            charset = value.to_string();
        }
    }

    let decoded: Vec<u8> = percent_decode_str(body).collect();
    let data = if is_base64 {
        let compact: Vec<u8> = decoded
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD.decode(compact).ok()?
    } else {
        decoded
    };
    Some(DataUrlPayload {
        mime_type,
        charset,
        data,
    })
}
