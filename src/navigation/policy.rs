//! Dispatch Policy
//!
//! Classifies a navigation requested by content into exactly one dispatch decision.
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. the coordinator handles every top-level content-initiated navigation;
//! 2. history navigations restoring a newly created child frame;
//! 3. privilege boundary crossings fork into a new context;
//! 4. the isolated popup heuristic forks;
//! 5. the "confirm navigation away" hook may cancel;
//! 6. network navigations are begun by the coordinator, everything else loads in place.
//!
//! Side effects that happen while evaluating (cancelling an initial history load,
//! running the confirmation hook) go through [`PolicyEnvironment`], so the algorithm
//! itself only inspects [`FrameFacts`] and the request.

use crate::config::PolicyConfig;
use crate::engine::ForkDecision;
use crate::history::ExpectedChildEntry;
use crate::navigation::request::{LocalNavigationRequest, NavigationCause};
use crate::protocol::OpenUrlParams;
use crate::types::{scheme, Disposition};
use tracing::debug;
use url::Url;

/// Snapshot of the frame state the policy depends on.
#[derive(Debug, Clone)]
pub struct FrameFacts {
    pub is_top_level: bool,
    pub unique_name: String,
    /// URL of the request that produced the current document; `about:blank` for the
    /// initial empty document.
    pub old_url: Url,
    pub view_source_mode: bool,
    pub privileged_bindings: bool,
    pub history_length: i32,
    pub back_count: i32,
    pub forward_count: i32,
    pub has_opener: bool,
    /// The frame has committed something or script touched its initial document.
    pub has_user_visible_state: bool,
}

/// The navigation being classified.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub request: &'a LocalNavigationRequest,
    pub is_content_initiated: bool,
    pub is_redirect: bool,
}

/// Result of running the confirmation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadVerdict {
    Proceed,
    Cancel,
    /// The hook destroyed the frame.
    FrameGone,
}

/// Why a navigation was routed to the coordinator instead of loading locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkReason {
    CoordinatorHandlesAllTopLevel,
    PrivilegeBoundary,
    IsolatedPopup,
    Embedder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    /// Send `OpenUrl` and do nothing locally.
    OpenViaCoordinator {
        params: OpenUrlParams,
        reason: ForkReason,
    },
    /// Ask the coordinator to load its stored entry into this new child frame.
    HistoryLoadInNewChild(OpenUrlParams),
    Suppress,
    /// Send `BeginNavigation` and wait for the coordinator to commit.
    BeginCoordinatorNavigation,
    /// Open in another context with this disposition.
    OpenExternally(Disposition),
    ProceedLocally,
}

/// Side effects and external answers the algorithm needs.
pub trait PolicyEnvironment {
    /// Consume the parent's expectation for a child frame named `unique_name`.
    fn take_expected_child(&mut self, unique_name: &str) -> Option<ExpectedChildEntry>;

    fn cancel_initial_history_load(&mut self);

    fn run_unload_confirmation(&mut self, is_reload: bool) -> UnloadVerdict;

    fn embedder_should_fork(
        &self,
        url: &Url,
        method: &str,
        is_initial_navigation: bool,
        is_redirect: bool,
    ) -> Option<ForkDecision>;
}

/// Decide how to dispatch `input`.
pub fn decide(
    input: PolicyInput<'_>,
    facts: &FrameFacts,
    config: &PolicyConfig,
    env: &mut impl PolicyEnvironment,
) -> PolicyDecision {
    let request = input.request;
    let url = &request.url;

    if input.is_content_initiated
        && facts.is_top_level
        && config.coordinator_handles_all_top_level_requests
    {
        return PolicyDecision::OpenViaCoordinator {
            params: open_url_params(request, request.referrer.clone(), facts, false),
            reason: ForkReason::CoordinatorHandlesAllTopLevel,
        };
    }

    if request.is_history_navigation_in_new_child && input.is_content_initiated && !facts.is_top_level
    {
        let should_ask_coordinator = env
            .take_expected_child(&facts.unique_name)
            .map(|entry| !entry.is_about_blank || !scheme::is_about_blank(url))
            .unwrap_or(false);
        if should_ask_coordinator {
            if !request.is_client_redirect {
                return PolicyDecision::HistoryLoadInNewChild(open_url_params(
                    request,
                    request.referrer.clone(),
                    facts,
                    true,
                ));
            }
            debug!(url = %url, "Client redirect interrupts initial history load");
            env.cancel_initial_history_load();
        }
    }

    if facts.is_top_level && input.is_content_initiated && !scheme::is_about(url) {
        if let Some((reason, send_referrer)) = privilege_fork(input, facts, config, env) {
            let referrer = if send_referrer {
                request.referrer.clone()
            } else {
                None
            };
            return PolicyDecision::OpenViaCoordinator {
                params: open_url_params(request, referrer, facts, false),
                reason,
            };
        }
    }

    let is_isolated_popup = scheme::is_about_blank(&facts.old_url)
        && facts.back_count < 1
        && facts.forward_count < 1
        && !facts.has_opener
        && facts.is_top_level
        && input.is_content_initiated
        && request.disposition == Disposition::CurrentTab
        && request.cause == NavigationCause::Other;
    if is_isolated_popup {
        return PolicyDecision::OpenViaCoordinator {
            params: open_url_params(request, None, facts, false),
            reason: ForkReason::IsolatedPopup,
        };
    }

    let should_confirm = request.disposition == Disposition::CurrentTab
        && !input.is_redirect
        && (!config.coordinator_side_navigation || request.check_for_coordinator_navigation)
        && facts.has_user_visible_state;
    if should_confirm {
        match env.run_unload_confirmation(request.cause == NavigationCause::Reload) {
            UnloadVerdict::Proceed => {}
            UnloadVerdict::Cancel | UnloadVerdict::FrameGone => return PolicyDecision::Suppress,
        }
    }

    if config.coordinator_side_navigation
        && request.check_for_coordinator_navigation
        && scheme::needs_network_request(url)
    {
        return match request.disposition {
            Disposition::CurrentTab => PolicyDecision::BeginCoordinatorNavigation,
            Disposition::Ignore => PolicyDecision::Suppress,
            other => PolicyDecision::OpenExternally(other),
        };
    }

    match request.disposition {
        Disposition::CurrentTab => PolicyDecision::ProceedLocally,
        Disposition::Ignore => PolicyDecision::Suppress,
        other => PolicyDecision::OpenExternally(other),
    }
}

/// Rule 3. Returns the fork reason and whether the referrer may be sent.
fn privilege_fork(
    input: PolicyInput<'_>,
    facts: &FrameFacts,
    config: &PolicyConfig,
    env: &mut impl PolicyEnvironment,
) -> Option<(ForkReason, bool)> {
    let request = input.request;
    let url = &request.url;
    let old_url = &facts.old_url;

    let crosses_boundary = config.is_privileged_scheme(url.scheme())
        || config.is_privileged_scheme(old_url.scheme())
        || facts.privileged_bindings
        || config.is_view_source_scheme(url.scheme())
        || (facts.view_source_mode && request.cause != NavigationCause::Reload)
        || (scheme::is_file(url) && !scheme::is_file(old_url));
    if crosses_boundary {
        return Some((ForkReason::PrivilegeBoundary, false));
    }

    let is_initial_navigation = facts.history_length == 0;
    env.embedder_should_fork(url, &request.method, is_initial_navigation, input.is_redirect)
        .map(|decision| (ForkReason::Embedder, decision.send_referrer))
}

fn open_url_params(
    request: &LocalNavigationRequest,
    referrer: Option<Url>,
    facts: &FrameFacts,
    is_history_navigation_in_new_child: bool,
) -> OpenUrlParams {
    OpenUrlParams {
        url: request.url.clone(),
        referrer,
        disposition: request.disposition,
        should_replace_current_entry: request.replaces_current_history_item
            && facts.history_length > 0,
        user_gesture: request.has_user_gesture,
        uses_post: request.method.eq_ignore_ascii_case("POST"),
        body: request.body.clone(),
        is_history_navigation_in_new_child,
    }
}
