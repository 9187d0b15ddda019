//! Navigation
//!
//! Per-frame navigation: request state, the dispatch policy that routes content-initiated
//! navigations, failure classification, and the state machine tying them to the engine.

pub mod failure;
pub mod machine;
pub mod policy;
pub mod request;

pub use failure::{FailureResponse, LoadError};
pub use machine::DispatchOutcome;
pub use policy::{ForkReason, PolicyDecision};
pub use request::{
    CommonNavigationParams, LocalNavigationRequest, NavigationCause, NavigationParams,
    NavigationRequestState, NavigationType, PageTransition, RequestKind,
    RequestNavigationParams, RequestSource, TransitionCore, TransitionQualifiers,
};
