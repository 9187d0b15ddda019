//! Frame detachment and teardown.

use crate::integration::test_utils::{add_child, url, Harness, Observed};
use framenav::frame::ReplicatedState;
use framenav::navigation::{DispatchOutcome, LocalNavigationRequest};
use framenav::protocol::{
    CoordinatorMessage, CreateFrameParams, HostMessage, InboundEnvelope,
};
use framenav::types::FrameId;

const MAIN: FrameId = FrameId(1);

#[test]
fn test_detach_twice_is_a_no_op() {
    let mut h = Harness::new().with_main_frame();
    add_child(&mut h, MAIN, FrameId(2), "child");
    h.drain();

    assert!(h.session.detach_frame(FrameId(2)).unwrap());
    assert!(!h.session.detach_frame(FrameId(2)).unwrap());

    assert_eq!(h.message_kinds(), vec!["Detached"]);
    assert_eq!(h.observer.events(), vec![Observed::Detached(FrameId(2))]);
    assert!(h.session.registry().children_of(MAIN).is_empty());
    assert_eq!(h.session.registry().len(), 1);
}

#[test]
fn test_coordinator_delete_tears_down_subtree() {
    let mut h = Harness::new().with_main_frame();
    add_child(&mut h, MAIN, FrameId(2), "a");
    add_child(&mut h, FrameId(2), FrameId(3), "b");
    h.drain();

    h.session
        .handle(InboundEnvelope::new(MAIN, CoordinatorMessage::Delete))
        .unwrap();

    assert!(h.session.registry().is_empty());
    assert_eq!(h.session.root(), None);
    assert_eq!(
        h.observer.events(),
        vec![
            Observed::Detached(FrameId(3)),
            Observed::Detached(FrameId(2)),
            Observed::Detached(MAIN),
        ]
    );
    let envelopes = h.drain();
    let detached: Vec<FrameId> = envelopes
        .iter()
        .filter(|e| e.message == HostMessage::Detached)
        .map(|e| e.frame_id)
        .collect();
    assert_eq!(detached, vec![FrameId(3), FrameId(2)]);
}

#[test]
fn test_detach_sends_final_state_before_detached() {
    let mut h = Harness::local().with_main_frame();
    add_child(&mut h, MAIN, FrameId(2), "child");
    h.session
        .begin_local_navigation(FrameId(2), LocalNavigationRequest::link(url("https://a.test/")))
        .unwrap();
    h.drain();

    h.session.detach_frame(FrameId(2)).unwrap();

    assert_eq!(h.message_kinds(), vec!["UpdateState", "Detached"]);
}

#[test]
fn test_detaching_provisional_frame_releases_placeholder() {
    let mut h = Harness::new();
    h.session
        .create_placeholder(FrameId(1), None, ReplicatedState::named("main"))
        .unwrap();
    h.session
        .create_frame(
            FrameId(2),
            CreateFrameParams {
                placeholder_id: Some(FrameId(1)),
                parent_id: None,
                previous_sibling_id: None,
                opener_id: None,
                replicated: ReplicatedState::named("main"),
            },
        )
        .unwrap();
    assert_eq!(
        h.session.placeholder(FrameId(1)).unwrap().provisional_frame(),
        Some(FrameId(2))
    );

    h.session.detach_frame(FrameId(2)).unwrap();

    let placeholder = h.session.placeholder(FrameId(1)).unwrap();
    assert_eq!(placeholder.provisional_frame(), None);
    assert_eq!(h.session.root(), Some(FrameId(1)));
    assert!(h.session.frame(FrameId(2)).is_none());
}

#[test]
fn test_frame_destroyed_by_unload_confirmation_aborts_navigation() {
    let mut h = Harness::local().with_main_frame();
    add_child(&mut h, MAIN, FrameId(2), "child");
    h.session
        .begin_local_navigation(FrameId(2), LocalNavigationRequest::link(url("https://a.test/")))
        .unwrap();
    h.drain();
    let loads_before = h.engine.loads().len();
    h.engine.with(|s| s.detach_on_unload = Some(FrameId(2)));

    let outcome = h
        .session
        .begin_local_navigation(FrameId(2), LocalNavigationRequest::link(url("https://a.test/next")))
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::FrameDetached);
    assert_eq!(h.engine.loads().len(), loads_before);
    assert_eq!(h.message_kinds(), vec!["UpdateState", "Detached"]);
    assert!(h.session.poisoned().is_none());
}

#[test]
fn test_operations_on_detached_frame_are_ignored() {
    let mut h = Harness::new().with_main_frame();
    add_child(&mut h, MAIN, FrameId(2), "child");
    h.session.detach_frame(FrameId(2)).unwrap();
    h.drain();

    let outcome = h
        .session
        .begin_local_navigation(FrameId(2), LocalNavigationRequest::link(url("https://a.test/")))
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::UnknownFrame);
    h.session.stop(FrameId(2)).unwrap();
    h.session.reload(FrameId(2), false).unwrap();
    h.session.did_stop_loading(FrameId(2)).unwrap();

    assert!(h.drain().is_empty());
    assert!(h.engine.loads().is_empty());
}
