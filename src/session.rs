//! Navigation Session
//!
//! [`NavigationSession`] is the embedding context for one frame tree: it owns the frame
//! registry, the history list counters, the configuration and the outbound coordinator
//! link, and it dispatches inbound [`CoordinatorMessage`]s. State that engine callouts
//! may touch lives in [`SessionCore`], kept apart from the engine so a callout can be
//! handed a mutable borrow of the core while the engine itself is borrowed.
//!
//! Every public operation returns `Result<_, SessionError>`. The first invariant
//! violation poisons the session and every later call fails with
//! [`SessionError::Poisoned`].

use crate::config::FrameNavConfig;
use crate::engine::{DefaultEmbedder, DocumentEngine, EmbedderHooks};
use crate::error::{InvariantViolation, SessionError};
use crate::frame::{LocalFrame, RemotePlaceholder, ReplicatedState, Representation};
use crate::history::HistoryCounters;
use crate::observer::FrameObserver;
use crate::protocol::{
    ChildFrameProps, CoordinatorLink, CoordinatorMessage, CreateFrameParams, HostEnvelope,
    HostMessage, InboundEnvelope,
};
use crate::registry::FrameRegistry;
use crate::types::{FrameId, RequestId};
use bitflags::bitflags;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

bitflags! {
    /// Privileged bindings enabled for the hosting process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BindingsPolicy: u32 {
        const WEB_UI = 1 << 0;
        const DOM_AUTOMATION = 1 << 1;
        const EXTERNAL_HOST = 1 << 2;
        const STATS_COLLECTION = 1 << 3;
    }
}

impl BindingsPolicy {
    /// Whether documents in this process run with elevated privileges.
    pub fn is_privileged(&self) -> bool {
        self.contains(BindingsPolicy::WEB_UI)
    }
}

/// Whether a detached frame leaves the tree or is being replaced in its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachKind {
    Remove,
    Swap,
}

/// Who asked for a detach. Only content-initiated removals are reported back to the
/// coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachInitiator {
    Content,
    Coordinator,
}

/// Session state reachable from engine callouts.
pub(crate) struct SessionCore {
    pub(crate) config: FrameNavConfig,
    pub(crate) registry: FrameRegistry,
    pub(crate) counters: HistoryCounters,
    pub(crate) link: Box<dyn CoordinatorLink>,
    pub(crate) observers: Vec<Box<dyn FrameObserver>>,
    pub(crate) root: Option<FrameId>,
    pub(crate) suspended_for_swap: bool,
    pub(crate) bindings: BindingsPolicy,
    pub(crate) poisoned: Option<InvariantViolation>,
}

impl SessionCore {
    pub(crate) fn send(&self, frame_id: FrameId, message: HostMessage) {
        self.link.deliver(HostEnvelope { frame_id, message });
    }

    pub(crate) fn notify(&mut self, mut f: impl FnMut(&mut dyn FrameObserver)) {
        for observer in self.observers.iter_mut() {
            f(observer.as_mut());
        }
    }

    /// Record the first violation; later ones are logged only.
    pub(crate) fn poison(&mut self, violation: InvariantViolation) {
        if self.poisoned.is_none() {
            error!(error = %violation, "Invariant violation, poisoning session");
            self.poisoned = Some(violation);
        } else {
            warn!(error = %violation, "Additional invariant violation on poisoned session");
        }
    }

    /// Poison the session and turn `violation` into the error the operation returns.
    pub(crate) fn fail(&mut self, violation: InvariantViolation) -> SessionError {
        self.poison(violation.clone());
        SessionError::Invariant(violation)
    }

    /// Surface a violation recorded during an engine callout.
    pub(crate) fn check(&self) -> Result<(), SessionError> {
        match &self.poisoned {
            Some(violation) => Err(SessionError::Invariant(violation.clone())),
            None => Ok(()),
        }
    }

    /// Detach a local frame and its subtree. Returns `Ok(false)` when `frame` is not a
    /// registered local frame, which makes a repeated detach a no-op.
    pub(crate) fn detach(
        &mut self,
        frame: FrameId,
        kind: DetachKind,
        initiator: DetachInitiator,
    ) -> Result<bool, InvariantViolation> {
        let Some(local) = self.registry.local(frame) else {
            return Ok(false);
        };
        let placeholder = local.placeholder;
        let is_main_frame = local.is_main_frame;
        let in_frame_tree = local.in_frame_tree;
        let current_entry = local.history.current_entry().cloned();

        if let Some(placeholder_id) = placeholder {
            match self.registry.placeholder(placeholder_id) {
                None => return Err(InvariantViolation::MissingPlaceholder(placeholder_id)),
                Some(remote) if remote.provisional_frame != Some(frame) => {
                    return Err(InvariantViolation::PlaceholderLinkMismatch {
                        placeholder: placeholder_id,
                        frame,
                    })
                }
                Some(_) => {}
            }
        }

        debug!(frame_id = %frame, ?kind, ?initiator, "Detaching frame");

        self.detach_children(frame)?;

        self.notify(|observer| observer.frame_detached(frame));

        if kind == DetachKind::Remove {
            if let Some(entry) = current_entry {
                self.send(frame, HostMessage::UpdateState { entry });
            }
            if initiator == DetachInitiator::Content {
                self.send(frame, HostMessage::Detached);
            }
            if !is_main_frame && in_frame_tree {
                self.registry.remove_from_parent(frame);
            }
        }

        if let Some(placeholder_id) = placeholder {
            if let Some(remote) = self.registry.placeholder_mut(placeholder_id) {
                remote.provisional_frame = None;
            }
        }
        if self.root == Some(frame) {
            self.root = None;
        }
        self.registry.unregister(frame);
        info!(frame_id = %frame, "Frame detached");
        Ok(true)
    }

    /// Remove every child of `id`, local or remote, leaving `id` itself in place.
    pub(crate) fn detach_children(&mut self, id: FrameId) -> Result<(), InvariantViolation> {
        for child in self.registry.children_of(id) {
            if self.registry.local(child).is_some() {
                self.detach(child, DetachKind::Remove, DetachInitiator::Content)?;
            } else {
                self.remove_placeholder(child)?;
            }
        }
        Ok(())
    }

    /// Tear down a remote placeholder, its provisional frame and its subtree.
    pub(crate) fn remove_placeholder(&mut self, id: FrameId) -> Result<(), InvariantViolation> {
        let Some(remote) = self.registry.placeholder(id) else {
            return Ok(());
        };
        if let Some(provisional) = remote.provisional_frame {
            self.detach(provisional, DetachKind::Remove, DetachInitiator::Coordinator)?;
        }
        self.detach_children(id)?;
        self.registry.remove_from_parent(id);
        if self.root == Some(id) {
            self.root = None;
        }
        self.registry.unregister(id);
        debug!(frame_id = %id, "Placeholder removed");
        Ok(())
    }

    pub(crate) fn schedule_client_redirect(&mut self, frame: FrameId) {
        if let Some(local) = self.registry.local_mut(frame) {
            local.client_redirect_scheduled = true;
        }
    }

    pub(crate) fn did_access_initial_document(&mut self, frame: FrameId) {
        if let Some(local) = self.registry.local_mut(frame) {
            local.has_accessed_initial_document = true;
        }
    }
}

/// Embedding context for one frame tree.
pub struct NavigationSession {
    pub(crate) core: SessionCore,
    pub(crate) engine: Box<dyn DocumentEngine>,
    pub(crate) embedder: Box<dyn EmbedderHooks>,
}

impl NavigationSession {
    pub fn new<E, L>(config: FrameNavConfig, engine: E, link: L) -> Self
    where
        E: DocumentEngine + 'static,
        L: CoordinatorLink + 'static,
    {
        let counters = HistoryCounters::new(config.history.max_entries);
        Self {
            core: SessionCore {
                config,
                registry: FrameRegistry::new(),
                counters,
                link: Box::new(link),
                observers: Vec::new(),
                root: None,
                suspended_for_swap: false,
                bindings: BindingsPolicy::empty(),
                poisoned: None,
            },
            engine: Box::new(engine),
            embedder: Box::new(DefaultEmbedder),
        }
    }

    pub fn with_embedder(mut self, embedder: impl EmbedderHooks + 'static) -> Self {
        self.embedder = Box::new(embedder);
        self
    }

    pub fn with_bindings(mut self, bindings: BindingsPolicy) -> Self {
        self.core.bindings = bindings;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn FrameObserver>) {
        self.core.observers.push(observer);
    }

    pub fn config(&self) -> &FrameNavConfig {
        &self.core.config
    }

    pub fn registry(&self) -> &FrameRegistry {
        &self.core.registry
    }

    pub fn frame(&self, id: FrameId) -> Option<&LocalFrame> {
        self.core.registry.local(id)
    }

    pub fn placeholder(&self, id: FrameId) -> Option<&RemotePlaceholder> {
        self.core.registry.placeholder(id)
    }

    pub fn counters(&self) -> &HistoryCounters {
        &self.core.counters
    }

    /// Current root of the frame tree, local or remote.
    pub fn root(&self) -> Option<FrameId> {
        self.core.root
    }

    pub fn is_suspended_for_swap(&self) -> bool {
        self.core.suspended_for_swap
    }

    pub fn bindings(&self) -> BindingsPolicy {
        self.core.bindings
    }

    pub fn poisoned(&self) -> Option<&InvariantViolation> {
        self.core.poisoned.as_ref()
    }

    pub(crate) fn ensure_usable(&self) -> Result<(), SessionError> {
        match &self.core.poisoned {
            Some(violation) => Err(SessionError::Poisoned(violation.clone())),
            None => Ok(()),
        }
    }

    /// Dispatch one inbound coordinator message.
    pub fn handle(&mut self, envelope: InboundEnvelope) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let frame = envelope.frame_id;
        match envelope.message {
            CoordinatorMessage::CreateMainFrame { replicated } => {
                self.create_main_frame(frame, replicated)
            }
            CoordinatorMessage::CreateFrame(params) => self.create_frame(frame, params),
            CoordinatorMessage::CreatePlaceholder {
                parent_id,
                replicated,
            } => self.create_placeholder(frame, parent_id, replicated),
            CoordinatorMessage::ChildFrameAllocated {
                request_id,
                frame_id,
            } => self.child_frame_allocated(frame, request_id, frame_id),
            CoordinatorMessage::StartNavigation(params) => self.start_navigation(frame, params),
            CoordinatorMessage::CommitNavigation(params) => self.commit_navigation(frame, params),
            CoordinatorMessage::FailedNavigation {
                params,
                error_code,
                has_stale_copy_in_cache,
            } => self.failed_navigation(frame, params, error_code, has_stale_copy_in_cache),
            CoordinatorMessage::Stop => self.stop(frame),
            CoordinatorMessage::BeforeUnload { is_reload } => self.before_unload(frame, is_reload),
            CoordinatorMessage::SwapOut(params) => self.swap_out(frame, params),
            CoordinatorMessage::Delete => self.delete_frame(frame),
            CoordinatorMessage::Reload { bypass_cache } => self.reload(frame, bypass_cache),
        }
    }

    /// Consume `inbox` in order until it closes or an invariant is violated.
    pub async fn run(
        &mut self,
        mut inbox: UnboundedReceiver<InboundEnvelope>,
    ) -> Result<(), SessionError> {
        info!("Navigation session started");
        while let Some(envelope) = inbox.recv().await {
            if let Err(err) = self.handle(envelope) {
                error!(error = %err, "Navigation session terminated");
                return Err(err);
            }
        }
        info!(frames = self.core.registry.len(), "Coordinator channel closed");
        Ok(())
    }

    /// Register the local root frame.
    pub fn create_main_frame(
        &mut self,
        id: FrameId,
        replicated: ReplicatedState,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        if let Some(existing) = self.core.root {
            if self.core.registry.local(existing).is_some() {
                return Err(self.core.fail(InvariantViolation::MainFrameAlreadySet {
                    existing,
                    incoming: id,
                }));
            }
        }
        self.core
            .registry
            .register(id, Representation::local(replicated, true))
            .map_err(|v| self.core.fail(v))?;
        if let Some(frame) = self.core.registry.local_mut(id) {
            frame.in_frame_tree = true;
        }
        self.core.root = Some(id);
        info!(frame_id = %id, "Main frame created");
        Ok(())
    }

    /// Create a local frame, either directly in the tree under a remote parent or as the
    /// provisional replacement for a placeholder.
    pub fn create_frame(
        &mut self,
        id: FrameId,
        params: CreateFrameParams,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let is_main_frame = params.parent_id.is_none();

        if let Some(placeholder_id) = params.placeholder_id {
            if self.core.registry.placeholder(placeholder_id).is_none() {
                debug!(frame_id = %id, placeholder_id = %placeholder_id, "Placeholder gone, dropping frame creation");
                return Ok(());
            }
            self.core
                .registry
                .register(id, Representation::local(params.replicated, is_main_frame))
                .map_err(|v| self.core.fail(v))?;
            if let Some(frame) = self.core.registry.local_mut(id) {
                frame.placeholder = Some(placeholder_id);
                frame.opener = params.opener_id;
            }
            if let Some(remote) = self.core.registry.placeholder_mut(placeholder_id) {
                remote.provisional_frame = Some(id);
            }
            info!(frame_id = %id, placeholder_id = %placeholder_id, "Provisional frame created");
            return Ok(());
        }

        let parent = match params.parent_id {
            Some(parent) if self.core.registry.placeholder(parent).is_some() => parent,
            other => {
                return Err(self.core.fail(InvariantViolation::MissingParentPlaceholder(
                    other.unwrap_or(id),
                )))
            }
        };
        self.core
            .registry
            .register(id, Representation::local(params.replicated, false))
            .map_err(|v| self.core.fail(v))?;
        self.core
            .registry
            .insert_child(parent, id, params.previous_sibling_id);
        if let Some(frame) = self.core.registry.local_mut(id) {
            frame.in_frame_tree = true;
            frame.opener = params.opener_id;
        }
        info!(frame_id = %id, parent_id = %parent, "Frame created");
        Ok(())
    }

    /// Register a remote placeholder, appended under `parent_id` or as the root.
    pub fn create_placeholder(
        &mut self,
        id: FrameId,
        parent_id: Option<FrameId>,
        replicated: ReplicatedState,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.core
            .registry
            .register(id, Representation::placeholder(replicated))
            .map_err(|v| self.core.fail(v))?;
        match parent_id {
            Some(parent) => {
                let last_child = self.core.registry.children_of(parent).last().copied();
                if !self.core.registry.insert_child(parent, id, last_child) {
                    warn!(frame_id = %id, parent_id = %parent, "Placeholder parent not registered");
                }
            }
            None => {
                if self.core.root.is_none() {
                    self.core.root = Some(id);
                }
            }
        }
        debug!(frame_id = %id, "Placeholder created");
        Ok(())
    }

    /// Ask the coordinator to allocate an identifier for a child frame content created
    /// under `parent`. Returns `None` if `parent` is not a local frame.
    pub fn create_child_frame(
        &mut self,
        parent: FrameId,
        props: ChildFrameProps,
    ) -> Result<Option<RequestId>, SessionError> {
        self.ensure_usable()?;
        let Some(frame) = self.core.registry.local_mut(parent) else {
            debug!(frame_id = %parent, "Child frame requested for unknown parent");
            return Ok(None);
        };
        let request_id = RequestId::next();
        frame.child_requests.insert(request_id, props.clone());
        self.core
            .send(parent, HostMessage::RequestChildFrame { request_id, props });
        Ok(Some(request_id))
    }

    /// Continuation of [`NavigationSession::create_child_frame`].
    pub fn child_frame_allocated(
        &mut self,
        parent: FrameId,
        request_id: RequestId,
        frame_id: Option<FrameId>,
    ) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let props = self
            .core
            .registry
            .local_mut(parent)
            .and_then(|frame| frame.child_requests.remove(&request_id));
        let Some(props) = props else {
            debug!(frame_id = %parent, request_id = %request_id, "No outstanding child frame request");
            return Ok(());
        };
        let Some(id) = frame_id else {
            debug!(frame_id = %parent, request_id = %request_id, "Coordinator refused child frame");
            return Ok(());
        };
        let replicated = ReplicatedState {
            name: props.name,
            unique_name: props.unique_name,
            origin: None,
        };
        self.core
            .registry
            .register(id, Representation::local(replicated, false))
            .map_err(|v| self.core.fail(v))?;
        self.core
            .registry
            .insert_child(parent, id, props.previous_sibling_id);
        if let Some(frame) = self.core.registry.local_mut(id) {
            frame.in_frame_tree = true;
        }
        info!(frame_id = %id, parent_id = %parent, "Child frame created");
        Ok(())
    }

    /// Coordinator-initiated removal of a local frame or a placeholder.
    pub fn delete_frame(&mut self, id: FrameId) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let result = if self.core.registry.local(id).is_some() {
            self.core
                .detach(id, DetachKind::Remove, DetachInitiator::Coordinator)
                .map(|_| ())
        } else if self.core.registry.placeholder(id).is_some() {
            self.core.remove_placeholder(id)
        } else {
            debug!(frame_id = %id, "Delete for unknown frame");
            Ok(())
        };
        result.map_err(|v| self.core.fail(v))
    }

    /// Content-initiated detach, e.g. the owner element was removed.
    pub fn detach_frame(&mut self, id: FrameId) -> Result<bool, SessionError> {
        self.ensure_usable()?;
        self.core
            .detach(id, DetachKind::Remove, DetachInitiator::Content)
            .map_err(|v| self.core.fail(v))
    }

    pub fn did_access_initial_document(&mut self, frame: FrameId) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.core.did_access_initial_document(frame);
        Ok(())
    }

    pub fn schedule_client_redirect(&mut self, frame: FrameId) -> Result<(), SessionError> {
        self.ensure_usable()?;
        self.core.schedule_client_redirect(frame);
        Ok(())
    }

    /// The engine finished loading the frame's document and subresources.
    pub fn did_stop_loading(&mut self, frame: FrameId) -> Result<(), SessionError> {
        self.ensure_usable()?;
        let Some(local) = self.core.registry.local_mut(frame) else {
            return Ok(());
        };
        let was_loading = local.is_loading;
        local.is_loading = false;
        local.history.clear_expected_children();
        if was_loading {
            self.core.send(frame, HostMessage::StopLoading);
        }
        Ok(())
    }
}
