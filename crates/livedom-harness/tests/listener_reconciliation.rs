//! Direct and delegated listener bookkeeping against the host ledger.

use std::rc::Rc;

use livedom_core::{
    Error, LifecycleEvent, ListenerOptions, LiveQuery, Notification, ObserverConfig, Subscriber,
};
use livedom_harness::{FakeHost, FakeListener, FakeTarget, NodeId, Recorder};
use pretty_assertions::assert_eq;

fn buttons(host: &FakeHost) -> (LiveQuery<FakeHost>, NodeId, NodeId) {
    let a = host.append(host.root(), "button", &[]);
    let b = host.append(host.root(), "button", &[]);
    let query = LiveQuery::collection(
        host.clone(),
        "button",
        Some(host.root()),
        ObserverConfig::default(),
    )
    .unwrap();
    (query, a, b)
}

// ============================================================================
// Direct listeners
// ============================================================================

#[test]
fn direct_listener_lands_on_every_match() {
    let host = FakeHost::new();
    let (query, a, b) = buttons(&host);
    let recorder = Recorder::new();
    recorder.attach(&query);

    let on_click = FakeListener::new(1);
    query.add_event_listener("click", on_click.clone(), false).unwrap();

    assert_eq!(host.nodes_with_listener("click", &on_click), vec![a, b]);
    assert!(query.has_event_listener("click", &on_click));
    assert_eq!(recorder.events(), vec![LifecycleEvent::EventListenersAdd]);

    query.remove_event_listener("click", &on_click).unwrap();
    assert!(host.nodes_with_listener("click", &on_click).is_empty());
    assert!(!query.has_event_listener("click", &on_click));
    assert_eq!(
        recorder.events(),
        vec![
            LifecycleEvent::EventListenersAdd,
            LifecycleEvent::EventListenersRemove
        ]
    );
}

#[test]
fn duplicate_direct_registration_is_ignored() {
    let host = FakeHost::new();
    let (query, a, _) = buttons(&host);
    let recorder = Recorder::new();
    recorder.attach(&query);

    let on_click = FakeListener::new(1);
    query.add_event_listener("click", on_click.clone(), false).unwrap();
    query.add_event_listener("click", on_click.clone(), true).unwrap();

    assert_eq!(host.listeners_on(&a.into()).len(), 1);
    assert_eq!(recorder.count(LifecycleEvent::EventListenersAdd), 1);
}

#[test]
fn removing_an_unknown_listener_is_silent() {
    let host = FakeHost::new();
    let (query, _, _) = buttons(&host);
    let recorder = Recorder::new();
    recorder.attach(&query);

    query
        .remove_event_listener("click", &FakeListener::new(9))
        .unwrap();
    assert!(recorder.events().is_empty());
}

#[test]
fn listeners_move_with_the_matched_set() {
    let host = FakeHost::new();
    let (query, a, b) = buttons(&host);
    let on_click = FakeListener::new(1);
    query.add_event_listener("click", on_click.clone(), false).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&query);

    host.remove(a);
    let c = host.append(host.root(), "button", &[]);
    host.flush();

    assert_eq!(host.nodes_with_listener("click", &on_click), vec![b, c]);
    assert_eq!(
        recorder.events(),
        vec![
            LifecycleEvent::EventListenersDetach,
            LifecycleEvent::EventListenersAttach,
            LifecycleEvent::Update
        ]
    );
}

#[test]
fn manual_attach_and_detach() {
    let host = FakeHost::new();
    let (query, a, b) = buttons(&host);
    let on_click = FakeListener::new(1);
    query.add_event_listener("click", on_click.clone(), false).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&query);

    query.detach_event_listeners();
    assert!(host.nodes_with_listener("click", &on_click).is_empty());
    assert!(query.has_event_listener("click", &on_click));

    query.attach_event_listeners_to(&[b]);
    assert_eq!(host.nodes_with_listener("click", &on_click), vec![b]);

    query.attach_event_listeners();
    let mut on = host.nodes_with_listener("click", &on_click);
    on.sort();
    assert_eq!(on, vec![a, b]);

    query.attach_event_listeners_to(&[]);
    assert_eq!(
        recorder.events(),
        vec![
            LifecycleEvent::EventListenersDetach,
            LifecycleEvent::EventListenersAttach,
            LifecycleEvent::EventListenersAttach
        ]
    );
}

#[test]
fn purge_detaches_and_forgets() {
    let host = FakeHost::new();
    let (query, _, _) = buttons(&host);
    let on_click = FakeListener::new(1);
    let on_focus = FakeListener::new(2);
    query.add_event_listener("click", on_click.clone(), false).unwrap();
    query.add_event_listener("focus", on_focus.clone(), true).unwrap();
    assert_eq!(host.registrations().len(), 4);

    let recorder = Recorder::new();
    recorder.attach(&query);
    query.purge_event_listeners();

    assert!(host.registrations().is_empty());
    assert!(!query.has_event_listener("click", &on_click));
    assert_eq!(recorder.events(), vec![LifecycleEvent::EventListenersPurge]);

    // A later match no longer picks anything up.
    host.append(host.root(), "button", &[]);
    host.flush();
    assert!(host.registrations().is_empty());
}

// ============================================================================
// Delegated listeners
// ============================================================================

#[test]
fn delegated_activation_fires_once_per_transition() {
    let host = FakeHost::new();
    let query = LiveQuery::collection(
        host.clone(),
        ".toast",
        Some(host.root()),
        ObserverConfig::default(),
    )
    .unwrap();
    let on_key = FakeListener::new(3);
    query
        .add_delegated_event_listener(
            FakeTarget::Document,
            "keydown",
            on_key.clone(),
            ListenerOptions::default(),
        )
        .unwrap();
    let recorder = Recorder::new();
    recorder.attach(&query);

    let first = host.append(host.root(), "div", &["toast"]);
    host.flush();
    let second = host.append(host.root(), "div", &["toast"]);
    host.flush();
    assert!(host.has_listener(&FakeTarget::Document, "keydown", &on_key));
    assert_eq!(host.listeners_on(&FakeTarget::Document).len(), 1);

    host.remove(first);
    host.flush();
    assert!(host.has_listener(&FakeTarget::Document, "keydown", &on_key));
    host.remove(second);
    host.flush();
    assert!(!host.has_listener(&FakeTarget::Document, "keydown", &on_key));

    assert_eq!(recorder.count(LifecycleEvent::DelegatedEventListenersAttach), 1);
    assert_eq!(recorder.count(LifecycleEvent::DelegatedEventListenersDetach), 1);
    assert_eq!(recorder.count(LifecycleEvent::Update), 4);
}

#[test]
fn delegated_add_remove_while_active() {
    let host = FakeHost::new();
    let (query, a, _) = buttons(&host);
    assert!(query.delegated_active());
    let recorder = Recorder::new();
    recorder.attach(&query);

    let on_scroll = FakeListener::new(4);
    let options = ListenerOptions {
        capture: true,
        passive: true,
        once: false,
    };
    query
        .add_delegated_event_listener(FakeTarget::Window, "scroll", on_scroll.clone(), options)
        .unwrap();
    query
        .add_delegated_event_listener(FakeTarget::Window, "scroll", on_scroll.clone(), options)
        .unwrap();
    let on_window = host.listeners_on(&FakeTarget::Window);
    assert_eq!(on_window.len(), 1);
    assert_eq!(on_window[0].options, options);

    // Another node is a valid delegated target too.
    query
        .add_delegated_event_listener(a.into(), "focus", on_scroll.clone(), options)
        .unwrap();
    assert!(host.has_listener(&a.into(), "focus", &on_scroll));

    query
        .remove_delegated_event_listener(&FakeTarget::Window, "scroll", &on_scroll)
        .unwrap();
    assert!(host.listeners_on(&FakeTarget::Window).is_empty());

    assert_eq!(
        recorder.events(),
        vec![
            LifecycleEvent::DelegatedEventListenersAdd,
            LifecycleEvent::DelegatedEventListenersAdd,
            LifecycleEvent::DelegatedEventListenersRemove
        ]
    );
}

#[test]
fn manual_delegated_attach_detach_and_purge() {
    let host = FakeHost::new();
    let (query, _, _) = buttons(&host);
    let on_resize = FakeListener::new(5);
    query
        .add_delegated_event_listener(
            FakeTarget::Window,
            "resize",
            on_resize.clone(),
            ListenerOptions::default(),
        )
        .unwrap();
    let recorder = Recorder::new();
    recorder.attach(&query);

    query.detach_delegated_event_listeners();
    query.detach_delegated_event_listeners();
    assert!(!query.delegated_active());
    query.attach_delegated_event_listeners();
    assert!(host.has_listener(&FakeTarget::Window, "resize", &on_resize));

    query.purge_delegated_event_listeners();
    assert!(!host.has_listener(&FakeTarget::Window, "resize", &on_resize));

    assert_eq!(
        recorder.events(),
        vec![
            LifecycleEvent::DelegatedEventListenersDetach,
            LifecycleEvent::DelegatedEventListenersAttach,
            LifecycleEvent::DelegatedEventListenersPurge
        ]
    );
}

#[test]
fn delegated_add_after_manual_detach_follows_the_matched_set() {
    let host = FakeHost::new();
    let item = host.append(host.root(), "li", &["item"]);
    let query = LiveQuery::collection(
        host.clone(),
        ".item",
        Some(host.root()),
        ObserverConfig::default(),
    )
    .unwrap();
    query.detach_delegated_event_listeners();
    assert!(!query.delegated_active());

    let on_resize = FakeListener::new(9);
    query
        .add_delegated_event_listener(
            FakeTarget::Window,
            "resize",
            on_resize.clone(),
            ListenerOptions::default(),
        )
        .unwrap();
    assert_eq!(query.len(), 1);
    assert!(host.has_listener(&FakeTarget::Window, "resize", &on_resize));

    // Re-activation on refresh does not add it a second time.
    query.refresh();
    assert_eq!(host.listeners_on(&FakeTarget::Window).len(), 1);

    host.remove(item);
    host.flush();
    assert!(!host.has_listener(&FakeTarget::Window, "resize", &on_resize));
}

#[test]
fn delegated_add_after_manual_attach_waits_for_a_match() {
    let host = FakeHost::new();
    let query = LiveQuery::collection(
        host.clone(),
        ".item",
        Some(host.root()),
        ObserverConfig::default(),
    )
    .unwrap();
    query.attach_delegated_event_listeners();
    assert!(query.delegated_active());

    let on_resize = FakeListener::new(9);
    query
        .add_delegated_event_listener(
            FakeTarget::Window,
            "resize",
            on_resize.clone(),
            ListenerOptions::default(),
        )
        .unwrap();
    assert!(query.is_empty());
    assert!(!host.has_listener(&FakeTarget::Window, "resize", &on_resize));

    host.append(host.root(), "li", &["item"]);
    host.flush();
    assert!(host.has_listener(&FakeTarget::Window, "resize", &on_resize));
    assert_eq!(host.listeners_on(&FakeTarget::Window).len(), 1);
}

// ============================================================================
// Argument validation
// ============================================================================

#[test]
fn invalid_arguments_leave_state_untouched() {
    let host = FakeHost::new();
    let (query, _, _) = buttons(&host);
    let recorder = Recorder::new();
    recorder.attach(&query);

    assert!(matches!(
        query.add_event_listener("", FakeListener::new(1), false),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        query.add_event_listener("click", FakeListener::not_callable(1), false),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        query.add_delegated_event_listener(
            FakeTarget::Object,
            "click",
            FakeListener::new(1),
            ListenerOptions::default()
        ),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        query.add_delegated_event_listener(
            FakeTarget::Window,
            "click",
            FakeListener::not_callable(1),
            ListenerOptions::default()
        ),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        query.remove_delegated_event_listener(&FakeTarget::Object, "click", &FakeListener::new(1)),
        Err(Error::InvalidArgument(_))
    ));

    assert!(host.registrations().is_empty());
    assert!(recorder.events().is_empty());
}

#[test]
fn unknown_event_names_are_rejected() {
    let host = FakeHost::new();
    let (query, _, _) = buttons(&host);
    let subscriber: Subscriber<NodeId> = Rc::new(|_: &Notification<NodeId>| {});

    assert_eq!(
        query.on_named("updated", Rc::clone(&subscriber)).err(),
        Some(Error::UnknownEvent("updated".into()))
    );
    assert_eq!(query.subscriber_count(LifecycleEvent::Update), 0);

    query.on_named("update", Rc::clone(&subscriber)).unwrap();
    query
        .on_named("eventListeners:add", Rc::clone(&subscriber))
        .unwrap();
    assert_eq!(query.subscriber_count(LifecycleEvent::Update), 1);
    assert_eq!(query.subscriber_count(LifecycleEvent::EventListenersAdd), 1);

    query.off_named("update", &subscriber).unwrap();
    assert_eq!(query.subscriber_count(LifecycleEvent::Update), 0);
}

#[test]
fn invalid_selector_fails_construction() {
    let host = FakeHost::new();
    let err = LiveQuery::collection(host.clone(), "ul > li", Some(host.root()), ObserverConfig::default())
        .unwrap_err();
    assert_eq!(err, Error::InvalidSelector("ul > li".into()));
    assert_eq!(host.observer_count(), 0);
}

#[test]
fn on_then_off_restores_subscriber_count() {
    let host = FakeHost::new();
    let (query, _, _) = buttons(&host);
    let subscriber: Subscriber<NodeId> = Rc::new(|_: &Notification<NodeId>| {});
    let before = query.subscriber_count(LifecycleEvent::Pause);

    query
        .on(LifecycleEvent::Pause, Rc::clone(&subscriber))
        .on(LifecycleEvent::Pause, Rc::clone(&subscriber));
    assert_eq!(query.subscriber_count(LifecycleEvent::Pause), before + 2);

    query.off(LifecycleEvent::Pause, &subscriber);
    assert_eq!(query.subscriber_count(LifecycleEvent::Pause), before + 1);
    query.off(LifecycleEvent::Pause, &subscriber);
    assert_eq!(query.subscriber_count(LifecycleEvent::Pause), before);
}
