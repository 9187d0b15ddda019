//! FrameNav: Frame Navigation Coordination
//!
//! The renderer-side half of a multi-process navigation protocol. A
//! [`NavigationSession`] tracks every frame of one tree as either a local frame or a
//! remote placeholder, drives each local frame's navigations through the provisional
//! and commit phases, routes content-initiated navigations through the dispatch policy,
//! and reports everything to the coordinator over an ordered link.

pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod history;
pub mod logging;
pub mod navigation;
pub mod observer;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod swap;
pub mod types;


pub use config::FrameNavConfig;
pub use engine::{DocumentEngine, EmbedderHooks, EngineScope};
pub use error::{InvariantViolation, NetErrorCode, SessionError};
pub use session::NavigationSession;
pub use types::FrameId;
