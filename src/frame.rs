//! Frame representations
//!
//! A frame slot in the tree is occupied either by a [`LocalFrame`] rendered in this
//! process or by a [`RemotePlaceholder`] standing in for a frame rendered elsewhere.

use crate::history::HistoryTracker;
use crate::navigation::NavigationRequestState;
use crate::protocol::ChildFrameProps;
use crate::types::{FrameId, RequestId};
use std::collections::HashMap;
use url::Url;

/// Lifecycle state of a local frame's current navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Provisional,
    Committed,
    Failed,
}

/// Frame attributes replicated between processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicatedState {
    pub name: String,
    pub unique_name: String,
    pub origin: Option<String>,
}

impl ReplicatedState {
    pub fn named(unique_name: &str) -> Self {
        Self {
            name: String::new(),
            unique_name: unique_name.to_string(),
            origin: None,
        }
    }
}

/// A frame rendered by this process.
#[derive(Debug)]
pub struct LocalFrame {
    pub(crate) phase: FramePhase,
    pub(crate) pending: Option<NavigationRequestState>,
    pub(crate) history: HistoryTracker,
    pub(crate) replicated: ReplicatedState,
    pub(crate) is_main_frame: bool,
    pub(crate) in_frame_tree: bool,
    /// Placeholder this provisional frame will replace on its first commit.
    pub(crate) placeholder: Option<FrameId>,
    pub(crate) opener: Option<FrameId>,
    pub(crate) is_loading: bool,
    pub(crate) awaiting_coordinator_commit: bool,
    pub(crate) has_accessed_initial_document: bool,
    pub(crate) client_redirect_scheduled: bool,
    pub(crate) view_source_mode: bool,
    pub(crate) committed_first_real_load: bool,
    pub(crate) last_committed_url: Option<Url>,
    pub(crate) child_requests: HashMap<RequestId, ChildFrameProps>,
}

impl LocalFrame {
    pub(crate) fn new(replicated: ReplicatedState, is_main_frame: bool) -> Self {
        Self {
            phase: FramePhase::Idle,
            pending: None,
            history: HistoryTracker::new(),
            replicated,
            is_main_frame,
            in_frame_tree: false,
            placeholder: None,
            opener: None,
            is_loading: false,
            awaiting_coordinator_commit: false,
            has_accessed_initial_document: false,
            client_redirect_scheduled: false,
            view_source_mode: false,
            committed_first_real_load: false,
            last_committed_url: None,
            child_requests: HashMap::new(),
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn pending(&self) -> Option<&NavigationRequestState> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub fn unique_name(&self) -> &str {
        &self.replicated.unique_name
    }

    pub fn is_main_frame(&self) -> bool {
        self.is_main_frame
    }

    pub fn in_frame_tree(&self) -> bool {
        self.in_frame_tree
    }

    pub fn placeholder(&self) -> Option<FrameId> {
        self.placeholder
    }

    pub fn opener(&self) -> Option<FrameId> {
        self.opener
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn awaiting_coordinator_commit(&self) -> bool {
        self.awaiting_coordinator_commit
    }

    pub fn view_source_mode(&self) -> bool {
        self.view_source_mode
    }

    pub fn last_committed_url(&self) -> Option<&Url> {
        self.last_committed_url.as_ref()
    }

    /// Whether the pending navigation (if any) came from the coordinator rather than
    /// from content. `javascript:` URLs always count as content.
    pub fn is_coordinator_initiated(&self) -> bool {
        self.pending
            .as_ref()
            .map(|p| p.is_coordinator_initiated())
            .unwrap_or(false)
    }

    /// Whether the frame already holds something worth confirming before leaving.
    pub(crate) fn has_user_visible_state(&self) -> bool {
        self.has_accessed_initial_document || self.history.current_entry().is_some()
    }
}

/// Stand-in for a frame rendered by another process.
#[derive(Debug, Clone, Default)]
pub struct RemotePlaceholder {
    pub(crate) replicated: ReplicatedState,
    /// Local frame created to replace this placeholder once it commits.
    pub(crate) provisional_frame: Option<FrameId>,
    pub(crate) is_loading: bool,
}

impl RemotePlaceholder {
    pub(crate) fn new(replicated: ReplicatedState) -> Self {
        Self {
            replicated,
            provisional_frame: None,
            is_loading: false,
        }
    }

    pub fn replicated(&self) -> &ReplicatedState {
        &self.replicated
    }

    pub fn provisional_frame(&self) -> Option<FrameId> {
        self.provisional_frame
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }
}

/// Occupant of a frame slot.
#[derive(Debug)]
pub enum Representation {
    Local(Box<LocalFrame>),
    Remote(RemotePlaceholder),
}

impl Representation {
    /// A new local frame in its initial state.
    pub fn local(replicated: ReplicatedState, is_main_frame: bool) -> Self {
        Representation::Local(Box::new(LocalFrame::new(replicated, is_main_frame)))
    }

    pub fn placeholder(replicated: ReplicatedState) -> Self {
        Representation::Remote(RemotePlaceholder::new(replicated))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Representation::Local(_))
    }
}
