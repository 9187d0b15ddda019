//! End-to-end navigation lifecycles driven through a session.

use crate::integration::test_utils::{
    commits, coordinator_params, entry, url, Harness, LoadBehavior, Observed,
};
use framenav::engine::{CachePolicy, FrameLoadType, HistoryLoadType, LoadSource};
use framenav::error::{InvariantViolation, NetErrorCode, SessionError};
use framenav::frame::{FramePhase, ReplicatedState};
use framenav::navigation::{
    DispatchOutcome, ForkReason, LoadError, LocalNavigationRequest, NavigationParams,
    NavigationType, TransitionCore,
};
use framenav::protocol::{CoordinatorMessage, HostMessage, InboundEnvelope, SwapOutParams};
use framenav::types::FrameId;

const MAIN: FrameId = FrameId(1);

fn load_locally(h: &mut Harness, target: &str) {
    let outcome = h
        .session
        .begin_local_navigation(MAIN, LocalNavigationRequest::link(url(target)))
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::LoadedLocally);
}

#[test]
fn test_link_click_loads_locally_and_advances_history() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/");
    h.drain();
    assert_eq!(h.session.counters().offset(), 0);
    assert_eq!(h.session.counters().length(), 1);

    let outcome = h
        .session
        .begin_local_navigation(MAIN, LocalNavigationRequest::link(url("https://a.test/next")))
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::LoadedLocally);
    let messages = h.messages();
    let commits = commits(&messages);
    assert_eq!(commits.len(), 1);
    assert!(commits[0].did_create_new_entry);
    assert_eq!(commits[0].url, url("https://a.test/next"));
    assert_eq!(commits[0].origin, "https://a.test");
    assert_eq!(commits[0].contents_mime_type.as_deref(), Some("text/html"));
    assert_eq!(commits[0].transition.core, TransitionCore::Link);
    assert_eq!(h.session.counters().offset(), 1);
    assert_eq!(h.session.counters().length(), 2);

    let frame = h.session.frame(MAIN).unwrap();
    assert_eq!(frame.phase(), FramePhase::Committed);
    assert!(frame.pending().is_none());
    assert_eq!(h.engine.with(|s| s.unload_prompts), 1);
}

#[test]
fn test_back_navigation_adopts_coordinator_offset() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/5");
    h.drain();

    let target = entry("main", "https://a.test/3", 33, 30);
    let mut params = NavigationParams::history(url("https://a.test/3"), &target, 7, 3);
    params.request.current_history_list_offset = 5;
    params.request.current_history_list_length = 6;
    h.session
        .handle(InboundEnvelope::new(MAIN, CoordinatorMessage::CommitNavigation(params)))
        .unwrap();

    assert_eq!(h.session.counters().offset(), 3);
    assert_eq!(h.session.counters().length(), 6);
    let load = h.engine.last_load().unwrap();
    assert_eq!(load.load_type, FrameLoadType::BackForward);

    let messages = h.messages();
    let commit = &commits(&messages)[0];
    assert!(!commit.did_create_new_entry);
    assert_eq!(commit.nav_entry_id, 7);
    assert_eq!(commit.item_sequence_number, 33);
    assert_eq!(commit.document_sequence_number, 30);
}

#[test]
fn test_saved_entry_restores_its_sequence_numbers() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/a");
    let first = h
        .session
        .frame(MAIN)
        .unwrap()
        .history()
        .current_entry()
        .unwrap()
        .clone();
    h.drain();

    load_locally(&mut h, "https://a.test/b");
    let saved = h
        .messages()
        .into_iter()
        .find_map(|m| match m {
            HostMessage::UpdateState { entry } => Some(entry),
            _ => None,
        })
        .unwrap();
    assert_eq!(saved, first);
    assert_ne!(
        h.session.frame(MAIN).unwrap().history().current_entry(),
        Some(&first)
    );

    let mut params = NavigationParams::history(url("https://a.test/a"), &saved, 1, 0);
    params.request.current_history_list_offset = 1;
    params.request.current_history_list_length = 2;
    h.session
        .handle(InboundEnvelope::new(MAIN, CoordinatorMessage::CommitNavigation(params)))
        .unwrap();

    let messages = h.messages();
    let commit = &commits(&messages)[0];
    assert_eq!(commit.item_sequence_number, first.item_sequence_number());
    assert_eq!(commit.document_sequence_number, first.document_sequence_number());
    assert_eq!(
        h.session.frame(MAIN).unwrap().history().current_entry(),
        Some(&first)
    );
    assert_eq!(h.session.counters().offset(), 0);
    assert_eq!(h.session.counters().length(), 2);
}

#[test]
fn test_privileged_scheme_forks_without_loading() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/");
    h.drain();
    let loads_before = h.engine.loads().len();

    let outcome = h
        .session
        .begin_local_navigation(MAIN, LocalNavigationRequest::link(url("chrome://settings/")))
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Forked(ForkReason::PrivilegeBoundary));
    assert_eq!(h.engine.loads().len(), loads_before);
    let messages = h.messages();
    assert!(commits(&messages).is_empty());
    match &messages[..] {
        [HostMessage::OpenUrl(params)] => {
            assert_eq!(params.url, url("chrome://settings/"));
            assert_eq!(params.referrer, None);
        }
        other => panic!("unexpected messages: {:?}", other),
    }
    assert_eq!(h.session.frame(MAIN).unwrap().phase(), FramePhase::Committed);
}

#[test]
fn test_aborted_load_returns_to_idle_with_one_stop() {
    let mut h = Harness::local().with_main_frame();
    h.engine.set_behavior("https://slow.test/", LoadBehavior::Pending);
    load_locally(&mut h, "https://slow.test/");
    assert_eq!(h.session.frame(MAIN).unwrap().phase(), FramePhase::Provisional);
    h.drain();

    h.session
        .fail_provisional_load(MAIN, LoadError::new(NetErrorCode::Aborted, url("https://slow.test/")))
        .unwrap();

    let frame = h.session.frame(MAIN).unwrap();
    assert_eq!(frame.phase(), FramePhase::Idle);
    assert!(frame.pending().is_none());
    assert!(!frame.is_loading());
    let kinds = h.message_kinds();
    assert_eq!(kinds.iter().filter(|k| **k == "StopLoading").count(), 1);
    assert!(!kinds.contains(&"DidCommit"));
    assert_eq!(h.engine.loads().len(), 1);
}

#[test]
fn test_swap_out_aborts_when_before_detach_hook_removes_root() {
    let mut h = Harness::new().with_main_frame();
    h.engine.with(|s| s.detach_on_before_detach = Some(MAIN));

    h.session
        .swap_out(
            MAIN,
            SwapOutParams {
                placeholder_id: FrameId(7),
                is_loading: false,
                replicated: ReplicatedState::named("main"),
            },
        )
        .unwrap();

    assert!(h.session.frame(MAIN).is_none());
    assert!(h.session.placeholder(FrameId(7)).is_none());
    assert!(h.session.registry().is_empty());
    assert_eq!(h.session.root(), None);
    assert!(!h.session.is_suspended_for_swap());
    let kinds = h.message_kinds();
    assert!(kinds.contains(&"Detached"));
    assert!(!kinds.contains(&"SwapOutAck"));
    assert_eq!(h.observer.events(), vec![Observed::Detached(MAIN)]);
}

#[test]
fn test_network_navigation_is_handed_to_coordinator_then_committed() {
    let mut h = Harness::new().with_main_frame();

    let outcome = h
        .session
        .begin_local_navigation(MAIN, LocalNavigationRequest::link(url("https://a.test/")))
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::BeganCoordinatorNavigation);
    assert_eq!(h.message_kinds(), vec!["BeginNavigation", "StartLoading"]);
    assert!(h.session.frame(MAIN).unwrap().awaiting_coordinator_commit());
    assert!(h.engine.loads().is_empty());

    h.session
        .commit_navigation(MAIN, coordinator_params("https://a.test/", -1, 0))
        .unwrap();

    let frame = h.session.frame(MAIN).unwrap();
    assert!(!frame.awaiting_coordinator_commit());
    assert_eq!(frame.phase(), FramePhase::Committed);
    assert_eq!(frame.last_committed_url(), Some(&url("https://a.test/")));
    assert_eq!(h.message_kinds(), vec!["DidCommit"]);
}

#[test]
fn test_second_navigation_replaces_pending_one() {
    let mut h = Harness::new().with_main_frame();
    h.engine.set_behavior("https://one.test/", LoadBehavior::Pending);
    h.engine.set_behavior("https://two.test/", LoadBehavior::Pending);

    h.session
        .start_navigation(MAIN, coordinator_params("https://one.test/", -1, 0))
        .unwrap();
    h.session
        .start_navigation(MAIN, coordinator_params("https://two.test/", -1, 0))
        .unwrap();

    let frame = h.session.frame(MAIN).unwrap();
    assert_eq!(frame.pending().unwrap().url, url("https://two.test/"));
    assert_eq!(
        h.observer.events(),
        vec![Observed::Started(MAIN, url("https://one.test/"))]
    );
    assert_eq!(h.message_kinds(), vec!["StartLoading"]);
}

#[test]
fn test_asynchronous_commit_completes_pending_navigation() {
    let mut h = Harness::new().with_main_frame();
    h.engine.set_behavior("https://a.test/", LoadBehavior::Pending);
    h.session
        .start_navigation(MAIN, coordinator_params("https://a.test/", -1, 0))
        .unwrap();
    let load = h.engine.last_load().unwrap();
    let commit = h.engine.commit_for(MAIN, &load);

    h.session.complete_load(MAIN, commit).unwrap();

    assert_eq!(h.session.frame(MAIN).unwrap().phase(), FramePhase::Committed);
    assert_eq!(h.session.counters().offset(), 0);
    assert_eq!(
        h.observer.events(),
        vec![
            Observed::Started(MAIN, url("https://a.test/")),
            Observed::Committed(MAIN, url("https://a.test/")),
        ]
    );
}

#[test]
fn test_commit_without_pending_navigation_poisons_session() {
    let mut h = Harness::new().with_main_frame();
    let commit = h.engine.commit_for(
        MAIN,
        &framenav::engine::LoadRequest::new(
            LoadSource::Url {
                url: url("https://a.test/"),
                method: "GET".to_string(),
                body: None,
                referrer: None,
            },
            FrameLoadType::Standard,
        ),
    );

    let err = h.session.complete_load(MAIN, commit).unwrap_err();
    assert_eq!(
        err.violation(),
        &InvariantViolation::CommitWithoutPendingNavigation(MAIN)
    );
    let later = h.session.stop(MAIN).unwrap_err();
    assert!(matches!(later, SessionError::Poisoned(_)));
}

#[test]
fn test_commit_with_mismatched_origin_poisons_session() {
    let mut h = Harness::new().with_main_frame();
    h.engine.set_behavior("https://a.test/", LoadBehavior::Pending);
    h.session
        .start_navigation(MAIN, coordinator_params("https://a.test/", -1, 0))
        .unwrap();
    let mut commit = h.engine.commit_for(MAIN, &h.engine.last_load().unwrap());
    commit.origin = "https://evil.test".to_string();

    let err = h.session.complete_load(MAIN, commit).unwrap_err();
    assert!(matches!(
        err.violation(),
        InvariantViolation::OriginMismatch { .. }
    ));
    assert!(h.session.poisoned().is_some());
}

#[test]
fn test_stop_abandons_provisional_navigation_without_failure() {
    let mut h = Harness::new().with_main_frame();
    h.engine.set_behavior("https://a.test/", LoadBehavior::Pending);
    h.session
        .start_navigation(MAIN, coordinator_params("https://a.test/", -1, 0))
        .unwrap();
    h.drain();

    h.session
        .handle(InboundEnvelope::new(MAIN, CoordinatorMessage::Stop))
        .unwrap();

    let frame = h.session.frame(MAIN).unwrap();
    assert_eq!(frame.phase(), FramePhase::Idle);
    assert!(frame.pending().is_none());
    assert_eq!(h.message_kinds(), vec!["StopLoading"]);
    assert_eq!(h.engine.with(|s| s.stops.clone()), vec![MAIN]);
    assert!(h.observer.events().contains(&Observed::Stopped(MAIN)));
    assert!(!h
        .observer
        .events()
        .iter()
        .any(|e| matches!(e, Observed::Failed(..))));
}

#[test]
fn test_before_unload_reports_verdict() {
    let mut h = Harness::new().with_main_frame();
    h.engine.with(|s| s.confirm_unload = false);

    h.session
        .handle(InboundEnvelope::new(
            MAIN,
            CoordinatorMessage::BeforeUnload { is_reload: false },
        ))
        .unwrap();

    match &h.messages()[..] {
        [HostMessage::BeforeUnloadAck {
            proceed,
            start,
            end,
        }] => {
            assert!(!proceed);
            assert!(start <= end);
        }
        other => panic!("unexpected messages: {:?}", other),
    }
}

#[test]
fn test_before_unload_acks_even_when_frame_detaches() {
    let mut h = Harness::new().with_main_frame();
    h.engine.with(|s| s.detach_on_unload = Some(MAIN));

    h.session.before_unload(MAIN, false).unwrap();

    assert!(h.session.frame(MAIN).is_none());
    let kinds = h.message_kinds();
    assert_eq!(kinds, vec!["Detached", "BeforeUnloadAck"]);
}

#[test]
fn test_reload_bypassing_cache_leaves_counters_unchanged() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/");
    h.drain();

    h.session
        .handle(InboundEnvelope::new(
            MAIN,
            CoordinatorMessage::Reload { bypass_cache: true },
        ))
        .unwrap();

    let load = h.engine.last_load().unwrap();
    assert_eq!(load.load_type, FrameLoadType::ReloadBypassingCache);
    assert_eq!(load.cache_policy, CachePolicy::BypassingCache);
    let messages = h.messages();
    let commit = &commits(&messages)[0];
    assert!(!commit.did_create_new_entry);
    assert_eq!(h.session.counters().offset(), 0);
    assert_eq!(h.session.counters().length(), 1);
}

#[test]
fn test_reload_without_current_entry_loads_normally() {
    let mut h = Harness::new().with_main_frame();
    let mut params = coordinator_params("https://a.test/", -1, 0);
    params.common.navigation_type = NavigationType::Reload;

    h.session.start_navigation(MAIN, params).unwrap();

    let load = h.engine.last_load().unwrap();
    assert_eq!(load.load_type, FrameLoadType::Standard);
    assert_eq!(load.cache_policy, CachePolicy::ValidatingCacheData);
}

#[test]
fn test_same_document_navigation_keeps_pending_load() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/");
    h.engine.set_behavior("https://b.test/", LoadBehavior::Pending);
    load_locally(&mut h, "https://b.test/");
    h.drain();

    let current = h.session.frame(MAIN).unwrap().history().current_entry().unwrap().clone();
    let mut commit = h.engine.commit_for(
        MAIN,
        &framenav::engine::LoadRequest::new(
            LoadSource::Url {
                url: url("https://a.test/#section"),
                method: "GET".to_string(),
                body: None,
                referrer: None,
            },
            FrameLoadType::Standard,
        ),
    );
    commit.entry = entry(
        "main",
        "https://a.test/#section",
        500,
        current.document_sequence_number(),
    );
    h.session.navigate_within_document(MAIN, commit).unwrap();

    let messages = h.messages();
    let commit = &commits(&messages)[0];
    assert!(commit.was_within_same_document);
    assert_eq!(h.session.counters().offset(), 0);
    let frame = h.session.frame(MAIN).unwrap();
    assert_eq!(frame.phase(), FramePhase::Provisional);
    assert_eq!(frame.pending().unwrap().url, url("https://b.test/"));
}

#[test]
fn test_data_url_navigation_loads_decoded_payload() {
    let mut h = Harness::new().with_main_frame();
    let mut params = coordinator_params("data:text/html;base64,PHA+aGk8L3A+", -1, 0);
    params.common.base_url_for_data_url = Some(url("https://base.test/"));
    params.common.history_url_for_data_url = Some(url("https://history.test/"));

    h.session.start_navigation(MAIN, params).unwrap();

    match h.engine.last_load().unwrap().source {
        LoadSource::Data {
            data,
            mime_type,
            base_url,
            unreachable_url,
            ..
        } => {
            assert_eq!(data, b"<p>hi</p>");
            assert_eq!(mime_type, "text/html");
            assert_eq!(base_url, url("https://base.test/"));
            assert_eq!(unreachable_url, Some(url("https://history.test/")));
        }
        other => panic!("unexpected source: {:?}", other),
    }
}

#[test]
fn test_undecodable_data_url_fails_with_invalid_url() {
    let mut h = Harness::new().with_main_frame();
    let mut params = coordinator_params("data:text/html;base64,%%%%", -1, 0);
    params.common.base_url_for_data_url = Some(url("https://base.test/"));

    h.session.start_navigation(MAIN, params).unwrap();

    let messages = h.messages();
    assert!(messages.iter().any(|m| matches!(
        m,
        HostMessage::DidFailProvisionalLoad {
            error_code: NetErrorCode::Other(-300),
            ..
        }
    )));
    let commit = &commits(&messages)[0];
    assert!(commit.url_is_unreachable);
}

#[test]
fn test_view_source_navigation_sets_mode() {
    let mut h = Harness::new().with_main_frame();
    let mut params = coordinator_params("https://a.test/", -1, 0);
    params.request.is_view_source = true;

    h.session.start_navigation(MAIN, params).unwrap();

    assert!(h.session.frame(MAIN).unwrap().view_source_mode());
}

#[test]
fn test_invalid_history_entry_is_ignored() {
    let mut h = Harness::new().with_main_frame();
    let mut params = coordinator_params("https://a.test/", -1, 0);
    params.request.page_state = Some(vec![1, 2, 3]);

    h.session.commit_navigation(MAIN, params).unwrap();

    assert!(h.engine.loads().is_empty());
    assert_eq!(h.session.frame(MAIN).unwrap().phase(), FramePhase::Idle);
}

#[test]
fn test_frame_detached_by_loaded_document_is_left_alone() {
    let mut h = Harness::local().with_main_frame();
    h.engine
        .set_behavior("https://a.test/", LoadBehavior::DetachFrame);

    let outcome = h
        .session
        .begin_local_navigation(MAIN, LocalNavigationRequest::link(url("https://a.test/")))
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::LoadedLocally);
    assert!(h.session.frame(MAIN).is_none());
    assert!(h.session.poisoned().is_none());
    assert!(!h.message_kinds().contains(&"DidCommit"));
}

#[test]
fn test_same_document_history_load_falls_back_across_documents() {
    let mut h = Harness::local().with_main_frame();
    load_locally(&mut h, "https://a.test/");
    let target = entry("main", "https://a.test/other", 900, 901);
    let mut params = NavigationParams::history(url("https://a.test/other"), &target, 3, 0);
    params.common.navigation_type = NavigationType::HistorySameDocument;
    params.request.current_history_list_offset = 0;
    params.request.current_history_list_length = 1;

    h.session.commit_navigation(MAIN, params).unwrap();

    let load = h.engine.last_load().unwrap();
    assert_eq!(load.history_load_type, HistoryLoadType::DifferentDocument);
    assert_eq!(load.load_type, FrameLoadType::BackForward);
}
