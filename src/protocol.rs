//! Coordinator protocol
//!
//! Inbound [`CoordinatorMessage`]s and outbound [`HostMessage`]s, each scoped to a frame
//! identifier by an envelope. Transport encoding is left to the embedder; the core only
//! needs ordered delivery, which [`CoordinatorLink`] provides.

use crate::error::NetErrorCode;
use crate::frame::ReplicatedState;
use crate::history::HistoryEntry;
use crate::navigation::request::{NavigationParams, PageTransition};
use crate::types::{Disposition, FrameId, RequestId};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use url::Url;

/// Message from the coordinator to one frame (or, for creation messages, about the
/// frame the envelope names).
#[derive(Debug, Clone)]
pub enum CoordinatorMessage {
    CreateMainFrame {
        replicated: ReplicatedState,
    },
    CreateFrame(CreateFrameParams),
    CreatePlaceholder {
        parent_id: Option<FrameId>,
        replicated: ReplicatedState,
    },
    /// Answer to [`HostMessage::RequestChildFrame`]; the envelope names the parent.
    ChildFrameAllocated {
        request_id: RequestId,
        frame_id: Option<FrameId>,
    },
    StartNavigation(NavigationParams),
    CommitNavigation(NavigationParams),
    FailedNavigation {
        params: NavigationParams,
        error_code: NetErrorCode,
        has_stale_copy_in_cache: bool,
    },
    Stop,
    BeforeUnload {
        is_reload: bool,
    },
    SwapOut(SwapOutParams),
    /// Coordinator-initiated removal of the frame.
    Delete,
    Reload {
        bypass_cache: bool,
    },
}

#[derive(Debug, Clone)]
pub struct CreateFrameParams {
    pub placeholder_id: Option<FrameId>,
    pub parent_id: Option<FrameId>,
    pub previous_sibling_id: Option<FrameId>,
    pub opener_id: Option<FrameId>,
    pub replicated: ReplicatedState,
}

#[derive(Debug, Clone)]
pub struct SwapOutParams {
    pub placeholder_id: FrameId,
    pub is_loading: bool,
    pub replicated: ReplicatedState,
}

#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    pub frame_id: FrameId,
    pub message: CoordinatorMessage,
}

impl InboundEnvelope {
    pub fn new(frame_id: FrameId, message: CoordinatorMessage) -> Self {
        Self { frame_id, message }
    }
}

/// Properties content supplies when it creates a child frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildFrameProps {
    pub name: String,
    pub unique_name: String,
    pub previous_sibling_id: Option<FrameId>,
}

/// Request to open a navigation somewhere other than in-place in this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenUrlParams {
    pub url: Url,
    pub referrer: Option<Url>,
    pub disposition: Disposition,
    pub should_replace_current_entry: bool,
    pub user_gesture: bool,
    pub uses_post: bool,
    pub body: Option<Vec<u8>>,
    pub is_history_navigation_in_new_child: bool,
}

/// Hand-off of a network navigation to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct BeginNavigationParams {
    pub request_id: RequestId,
    pub url: Url,
    pub method: String,
    pub body: Option<Vec<u8>>,
    pub referrer: Option<Url>,
    pub transition: PageTransition,
    pub has_user_gesture: bool,
    pub is_form_submission: bool,
    pub navigation_start: Instant,
}

/// Everything the coordinator learns about a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitNotification {
    pub url: Url,
    pub base_url: Option<Url>,
    pub origin: String,
    /// Only reported for the main frame.
    pub contents_mime_type: Option<String>,
    pub http_status: u16,
    pub method: String,
    pub transition: PageTransition,
    pub did_create_new_entry: bool,
    pub should_replace_current_entry: bool,
    pub intended_as_new_entry: bool,
    pub nav_entry_id: i32,
    pub was_within_same_document: bool,
    pub url_is_unreachable: bool,
    pub redirects: Vec<Url>,
    pub original_request_url: Url,
    pub should_update_history: bool,
    pub unique_name: String,
    pub item_sequence_number: i64,
    pub document_sequence_number: i64,
    pub history_list_was_cleared: bool,
    pub referrer: Option<Url>,
    pub navigation_start: Instant,
    pub entry: HistoryEntry,
}

/// Message from a frame to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    StartLoading,
    StopLoading,
    DidCommit(Box<CommitNotification>),
    DidFailProvisionalLoad {
        error_code: NetErrorCode,
        url: Url,
    },
    Detached,
    OpenUrl(OpenUrlParams),
    BeginNavigation(BeginNavigationParams),
    DownloadUrl {
        url: Url,
        referrer: Option<Url>,
    },
    CancelInitialHistoryLoad,
    RequestChildFrame {
        request_id: RequestId,
        props: ChildFrameProps,
    },
    UpdateState {
        entry: HistoryEntry,
    },
    SwapOutAck,
    BeforeUnloadAck {
        proceed: bool,
        start: Instant,
        end: Instant,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostEnvelope {
    pub frame_id: FrameId,
    pub message: HostMessage,
}

/// Ordered outbound channel to the coordinator.
pub trait CoordinatorLink {
    fn deliver(&self, envelope: HostEnvelope);
}

impl CoordinatorLink for UnboundedSender<HostEnvelope> {
    fn deliver(&self, envelope: HostEnvelope) {
        if let Err(err) = UnboundedSender::send(self, envelope) {
            debug!(frame_id = %err.0.frame_id, "Coordinator channel closed, dropping message");
        }
    }
}
