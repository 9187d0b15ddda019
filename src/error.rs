//! Error types for the frame navigation coordinator.

use crate::types::FrameId;
use std::fmt;
use thiserror::Error;

/// Fetch-layer error codes reported for a navigation that could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetErrorCode {
    Aborted,
    BlockedByClient,
    BlockedByResponse,
    ConnectionFailed,
    NameNotResolved,
    TimedOut,
    CacheMiss,
    Other(i32),
}

impl NetErrorCode {
    pub fn kind(&self) -> NavigationErrorKind {
        match self {
            NetErrorCode::Aborted => NavigationErrorKind::Aborted,
            NetErrorCode::BlockedByResponse => NavigationErrorKind::PolicyBlocked,
            _ => NavigationErrorKind::NetworkOrProtocolFailure,
        }
    }
}

impl fmt::Display for NetErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetErrorCode::Aborted => write!(f, "ERR_ABORTED"),
            NetErrorCode::BlockedByClient => write!(f, "ERR_BLOCKED_BY_CLIENT"),
            NetErrorCode::BlockedByResponse => write!(f, "ERR_BLOCKED_BY_RESPONSE"),
            NetErrorCode::ConnectionFailed => write!(f, "ERR_CONNECTION_FAILED"),
            NetErrorCode::NameNotResolved => write!(f, "ERR_NAME_NOT_RESOLVED"),
            NetErrorCode::TimedOut => write!(f, "ERR_TIMED_OUT"),
            NetErrorCode::CacheMiss => write!(f, "ERR_CACHE_MISS"),
            NetErrorCode::Other(code) => write!(f, "ERR_{}", code),
        }
    }
}

/// Recoverable failure classes. These never propagate out of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationErrorKind {
    /// Superseded or explicitly stopped.
    Aborted,
    /// Blocked by a configured content policy.
    PolicyBlocked,
    NetworkOrProtocolFailure,
}

/// Programming-contract violations. Any of these poisons the owning session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("Duplicate frame identifier registered: {0}")]
    DuplicateFrameId(FrameId),


    #[error("No placeholder registered for swap of {0}")]
    MissingPlaceholder(FrameId),

    #[error("Commit received for {0} with no pending provisional navigation")]
    CommitWithoutPendingNavigation(FrameId),

    #[error("Frame {0} is already in the frame tree")]
    FrameAlreadyInTree(FrameId),

    #[error("Frame {0} is mid-swap and cannot be swapped out")]
    FrameMidSwap(FrameId),

    #[error("Root frame already set to {existing}, refusing {incoming}")]
    MainFrameAlreadySet { existing: FrameId, incoming: FrameId },

    #[error("Parent placeholder {0} is not registered")]
    MissingParentPlaceholder(FrameId),

    #[error("Expected {0} to be a local frame")]
    NotALocalFrame(FrameId),

    #[error("History list was not cleared: offset {offset}, length {length}")]
    HistoryNotCleared { offset: i32, length: i32 },

    #[error("Committed origin {origin} does not match URL {url}")]
    OriginMismatch { origin: String, url: String },

    #[error("Placeholder {placeholder} does not reference provisional frame {frame}")]
    PlaceholderLinkMismatch { placeholder: FrameId, frame: FrameId },
}

/// Errors surfaced by [`crate::session::NavigationSession`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Session poisoned by an earlier invariant violation: {0}")]
    Poisoned(InvariantViolation),
}

impl SessionError {
    /// The violation that terminated (or had already terminated) the session.
    pub fn violation(&self) -> &InvariantViolation {
        match self {
            SessionError::Invariant(v) | SessionError::Poisoned(v) => v,
        }
    }
}

/// Failures decoding a persisted history entry blob.
#[derive(Debug, Error)]
pub enum HistoryEntryError {
    #[error("History entry blob too short: {0} bytes")]
    TooShort(usize),

    #[error("Unsupported history entry version: {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed history entry: {0}")]
    Malformed(String),
}

/// Configuration and logging setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
