//! Shared test utilities for integration tests
//!
//! Provides a scriptable document engine, a recording observer and a harness wiring both
//! into a session whose coordinator link is an in-memory channel.

use framenav::config::FrameNavConfig;
use framenav::engine::{
    CommitType, DocumentCommit, DocumentEngine, EngineScope, HistoryLoadType, LoadOutcome,
    LoadRequest, LoadSource,
};
use framenav::error::NetErrorCode;
use framenav::frame::ReplicatedState;
use framenav::history::{HistoryEntry, HistorySnapshot};
use framenav::navigation::{LoadError, NavigationParams};
use framenav::observer::FrameObserver;
use framenav::protocol::{ChildFrameProps, CommitNotification, HostEnvelope, HostMessage};
use framenav::types::{origin_of, FrameId};
use framenav::NavigationSession;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use url::Url;

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Build a history entry with explicit sequence numbers.
pub fn entry(target: &str, url: &str, isn: i64, dsn: i64) -> HistoryEntry {
    HistoryEntry::from_snapshot(&HistorySnapshot {
        url: url.to_string(),
        target: target.to_string(),
        item_sequence_number: isn,
        document_sequence_number: dsn,
        ..Default::default()
    })
    .unwrap()
}

/// What the scripted engine does when asked to load a URL.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadBehavior {
    Commit,
    Fail(NetErrorCode),
    Pending,
    /// Script in the new document detaches the loading frame.
    DetachFrame,
}

#[derive(Debug)]
pub struct EngineState {
    pub loads: Vec<(FrameId, LoadRequest)>,
    pub behaviors: HashMap<String, LoadBehavior>,
    pub confirm_unload: bool,
    pub unload_prompts: usize,
    /// Frame detached by script when the unload confirmation runs.
    pub detach_on_unload: Option<FrameId>,
    /// Frame detached by script when the before-detach hook runs.
    pub detach_on_before_detach: Option<FrameId>,
    pub before_detach_calls: Vec<FrameId>,
    pub stops: Vec<FrameId>,
    pub fallback_content: bool,
    pub document_urls: HashMap<FrameId, Url>,
    next_sequence_number: i64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            loads: Vec::new(),
            behaviors: HashMap::new(),
            confirm_unload: true,
            unload_prompts: 0,
            detach_on_unload: None,
            detach_on_before_detach: None,
            before_detach_calls: Vec::new(),
            stops: Vec::new(),
            fallback_content: false,
            document_urls: HashMap::new(),
            next_sequence_number: 100,
        }
    }
}

impl EngineState {
    fn next_sequence_number(&mut self) -> i64 {
        self.next_sequence_number += 1;
        self.next_sequence_number
    }

    /// The commit the engine reports for `request`. History loads reuse the entry they
    /// restore; everything else gets fresh sequence numbers.
    pub fn commit_for(&mut self, frame: FrameId, request: &LoadRequest) -> DocumentCommit {
        let (url, unreachable_url, mime_type) = match &request.source {
            LoadSource::Url { url, .. } => (url.clone(), None, "text/html".to_string()),
            LoadSource::Data {
                base_url,
                unreachable_url,
                mime_type,
                ..
            } => (base_url.clone(), unreachable_url.clone(), mime_type.clone()),
        };
        let entry = match &request.history_entry {
            Some(entry) => entry.clone(),
            None => {
                let isn = self.next_sequence_number();
                let dsn = self.next_sequence_number();
                entry(&format!("frame-{}", frame.0), url.as_str(), isn, dsn)
            }
        };
        self.document_urls.insert(frame, url.clone());
        DocumentCommit {
            origin: origin_of(&url),
            mime_type,
            http_status: 200,
            entry,
            commit_type: CommitType::for_load(request.load_type),
            base_url: None,
            was_within_same_document: request.history_load_type == HistoryLoadType::SameDocument,
            unreachable_url,
            url,
        }
    }
}

/// Document engine whose behavior tests configure through [`EngineHandle`].
pub struct ScriptedEngine {
    state: Arc<Mutex<EngineState>>,
}

#[derive(Clone)]
pub struct EngineHandle(Arc<Mutex<EngineState>>);

impl EngineHandle {
    pub fn set_behavior(&self, url: &str, behavior: LoadBehavior) {
        self.0.lock().behaviors.insert(url.to_string(), behavior);
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        f(&mut self.0.lock())
    }

    pub fn loads(&self) -> Vec<(FrameId, LoadRequest)> {
        self.0.lock().loads.clone()
    }

    pub fn last_load(&self) -> Option<LoadRequest> {
        self.0.lock().loads.last().map(|(_, request)| request.clone())
    }

    pub fn commit_for(&self, frame: FrameId, request: &LoadRequest) -> DocumentCommit {
        self.0.lock().commit_for(frame, request)
    }
}

impl DocumentEngine for ScriptedEngine {
    fn load_document(
        &mut self,
        frame: FrameId,
        request: &LoadRequest,
        scope: &mut EngineScope<'_>,
    ) -> LoadOutcome {
        let behavior = {
            let mut state = self.state.lock();
            state.loads.push((frame, request.clone()));
            state
                .behaviors
                .get(request.url().as_str())
                .cloned()
                .unwrap_or(LoadBehavior::Commit)
        };
        match behavior {
            LoadBehavior::Commit => LoadOutcome::Committed(self.state.lock().commit_for(frame, request)),
            LoadBehavior::Fail(code) => {
                LoadOutcome::Failed(LoadError::new(code, request.url().clone()))
            }
            LoadBehavior::Pending => LoadOutcome::Pending,
            LoadBehavior::DetachFrame => {
                scope.detach_frame(frame);
                LoadOutcome::Pending
            }
        }
    }

    fn run_unload_confirmation(
        &mut self,
        _frame: FrameId,
        _is_reload: bool,
        scope: &mut EngineScope<'_>,
    ) -> bool {
        let (proceed, detach) = {
            let mut state = self.state.lock();
            state.unload_prompts += 1;
            (state.confirm_unload, state.detach_on_unload.take())
        };
        if let Some(victim) = detach {
            scope.detach_frame(victim);
        }
        proceed
    }

    fn run_before_detach_hook(&mut self, frame: FrameId, scope: &mut EngineScope<'_>) {
        let detach = {
            let mut state = self.state.lock();
            state.before_detach_calls.push(frame);
            state.detach_on_before_detach.take()
        };
        if let Some(victim) = detach {
            scope.detach_frame(victim);
        }
    }

    fn stop_loading(&mut self, frame: FrameId, _scope: &mut EngineScope<'_>) {
        self.state.lock().stops.push(frame);
    }

    fn current_document_url(&self, frame: FrameId) -> Option<Url> {
        self.state.lock().document_urls.get(&frame).cloned()
    }

    fn render_fallback_content(&mut self, _frame: FrameId, _error: &LoadError) -> bool {
        self.state.lock().fallback_content
    }
}

/// Lifecycle notification as seen by an observer.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Started(FrameId, Url),
    Committed(FrameId, Url),
    Failed(FrameId, NetErrorCode),
    Stopped(FrameId),
    Detached(FrameId),
}

#[derive(Clone, Default)]
pub struct RecordingObserver(Arc<Mutex<Vec<Observed>>>);

impl RecordingObserver {
    pub fn events(&self) -> Vec<Observed> {
        self.0.lock().clone()
    }
}

impl FrameObserver for RecordingObserver {
    fn did_start_provisional_load(&mut self, frame: FrameId, url: &Url) {
        self.0.lock().push(Observed::Started(frame, url.clone()));
    }

    fn did_commit_provisional_load(&mut self, frame: FrameId, commit: &CommitNotification) {
        self.0.lock().push(Observed::Committed(frame, commit.url.clone()));
    }

    fn did_fail_provisional_load(&mut self, frame: FrameId, error: &LoadError) {
        self.0.lock().push(Observed::Failed(frame, error.code));
    }

    fn on_stop(&mut self, frame: FrameId) {
        self.0.lock().push(Observed::Stopped(frame));
    }

    fn frame_detached(&mut self, frame: FrameId) {
        self.0.lock().push(Observed::Detached(frame));
    }
}

/// A session wired to a scripted engine, a recording observer and a channel link.
pub struct Harness {
    pub session: NavigationSession,
    pub engine: EngineHandle,
    pub observer: RecordingObserver,
    outbox: UnboundedReceiver<HostEnvelope>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FrameNavConfig::default(), |session| session)
    }

    /// Default configuration with coordinator-side navigation turned off, so network
    /// navigations load locally.
    pub fn local() -> Self {
        let mut config = FrameNavConfig::default();
        config.policy.coordinator_side_navigation = false;
        Self::build(config, |session| session)
    }

    pub fn build(
        config: FrameNavConfig,
        customize: impl FnOnce(NavigationSession) -> NavigationSession,
    ) -> Self {
        let state = Arc::new(Mutex::new(EngineState::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = ScriptedEngine {
            state: Arc::clone(&state),
        };
        let mut session = customize(NavigationSession::new(config, engine, tx));
        let observer = RecordingObserver::default();
        session.add_observer(Box::new(observer.clone()));
        Self {
            session,
            engine: EngineHandle(state),
            observer,
            outbox: rx,
        }
    }

    /// Harness with a local main frame `1` already created.
    pub fn with_main_frame(mut self) -> Self {
        self.session
            .create_main_frame(FrameId(1), ReplicatedState::named("main"))
            .unwrap();
        self
    }

    /// Every envelope sent since the last drain.
    pub fn drain(&mut self) -> Vec<HostEnvelope> {
        let mut envelopes = Vec::new();
        while let Ok(envelope) = self.outbox.try_recv() {
            envelopes.push(envelope);
        }
        envelopes
    }

    pub fn messages(&mut self) -> Vec<HostMessage> {
        self.drain().into_iter().map(|e| e.message).collect()
    }

    /// Messages since the last drain, reduced to their variant names.
    pub fn message_kinds(&mut self) -> Vec<&'static str> {
        self.messages().iter().map(kind_of).collect()
    }
}

pub fn kind_of(message: &HostMessage) -> &'static str {
    match message {
        HostMessage::StartLoading => "StartLoading",
        HostMessage::StopLoading => "StopLoading",
        HostMessage::DidCommit(_) => "DidCommit",
        HostMessage::DidFailProvisionalLoad { .. } => "DidFailProvisionalLoad",
        HostMessage::Detached => "Detached",
        HostMessage::OpenUrl(_) => "OpenUrl",
        HostMessage::BeginNavigation(_) => "BeginNavigation",
        HostMessage::DownloadUrl { .. } => "DownloadUrl",
        HostMessage::CancelInitialHistoryLoad => "CancelInitialHistoryLoad",
        HostMessage::RequestChildFrame { .. } => "RequestChildFrame",
        HostMessage::UpdateState { .. } => "UpdateState",
        HostMessage::SwapOutAck => "SwapOutAck",
        HostMessage::BeforeUnloadAck { .. } => "BeforeUnloadAck",
    }
}

/// The commit notifications among `messages`.
pub fn commits(messages: &[HostMessage]) -> Vec<CommitNotification> {
    messages
        .iter()
        .filter_map(|m| match m {
            HostMessage::DidCommit(commit) => Some((**commit).clone()),
            _ => None,
        })
        .collect()
}

/// Coordinator navigation parameters carrying the coordinator's current list view.
pub fn coordinator_params(target: &str, offset: i32, length: i32) -> NavigationParams {
    let mut params = NavigationParams::new(url(target));
    params.request.current_history_list_offset = offset;
    params.request.current_history_list_length = length;
    params
}

/// Create a content child frame under `parent` and have the coordinator allocate `id`.
pub fn add_child(h: &mut Harness, parent: FrameId, id: FrameId, unique_name: &str) {
    let request_id = h
        .session
        .create_child_frame(
            parent,
            ChildFrameProps {
                name: unique_name.to_string(),
                unique_name: unique_name.to_string(),
                previous_sibling_id: None,
            },
        )
        .unwrap()
        .unwrap();
    h.session
        .child_frame_allocated(parent, request_id, Some(id))
        .unwrap();
}
