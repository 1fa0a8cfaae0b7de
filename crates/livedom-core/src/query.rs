#![forbid(unsafe_code)]

//! Self-refreshing selector queries.
//!
//! # Design
//!
//! [`LiveQuery<H>`] is a cloneable handle over shared, single-threaded state
//! (`Rc<RefCell<..>>`). One component carries the subscription registry, the
//! pause/resume control, and both listener registries. The shape of the
//! matched state is a tagged strategy ([`Mode::Single`] or
//! [`Mode::Collection`]) chosen at construction.
//!
//! A refresh re-evaluates the selector against the parent, diffs the result
//! against the stored matched state, moves direct listeners off the nodes
//! that left and onto the nodes that entered, fires `update`, and finally
//! activates or deactivates delegated listeners depending on whether
//! anything is matched.
//!
//! # Invariants
//!
//! 1. After every refresh the matched state equals a fresh query of the
//!    parent, in document order.
//! 2. Every direct listener is attached to every matched node and to no
//!    other node.
//! 3. Delegated listeners are attached iff the matched state is non-empty
//!    (as of the last refresh).
//! 4. While paused, host mutation batches never trigger a refresh.
//!
//! # Failure Modes
//!
//! - **Feedback loops**: an `update` subscriber that mutates the watched
//!   subtree will be notified again by the host. Wrap such mutations in
//!   `pause()`/`resume()`; `resume()` refreshes once to catch up.
//! - **Reference cycles**: subscribers that capture a clone of the query keep
//!   it alive. `dispose()` drops all subscribers and breaks the cycle.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::config::{ListenerOptions, ObserverConfig};
use crate::diff::{diff_collection, diff_single};
use crate::error::{Error, Result};
use crate::event::{LifecycleEvent, Notification, Subscriber, Subscribers, Update};
use crate::host::{Host, RefreshCallback};
use crate::listeners::{DelegatedListeners, DirectListeners};

/// Shape of the matched state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// At most one node: the first match.
    Single,
    /// Every match, in document order.
    Collection,
}

#[derive(Debug)]
enum Matched<N> {
    Single(Option<N>),
    Collection(Vec<N>),
}

impl<N> Matched<N> {
    fn empty(mode: Mode) -> Self {
        match mode {
            Mode::Single => Self::Single(None),
            Mode::Collection => Self::Collection(Vec::new()),
        }
    }

    fn nodes(&self) -> &[N] {
        match self {
            Self::Single(item) => item.as_slice(),
            Self::Collection(items) => items,
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Single(item) => *item = None,
            Self::Collection(items) => items.clear(),
        }
    }
}

/// Link from a nested query to the query that supplies its parent node.
struct Upstream<H: Host> {
    query: LiveQuery<H>,
    subscriber: Subscriber<H::Node>,
}

struct State<H: Host> {
    parent: Option<H::Node>,
    matched: Matched<H::Node>,
    direct: DirectListeners<H::Listener>,
    delegated: DelegatedListeners<H::Target, H::Listener>,
    subscribers: Subscribers<H::Node>,
    observation: Option<H::Observation>,
    upstream: Option<Upstream<H>>,
    paused: bool,
    disposed: bool,
}

struct Shared<H: Host> {
    host: H,
    selector: String,
    mode: Mode,
    config: ObserverConfig,
    state: RefCell<State<H>>,
}

/// A selector query that keeps itself, and the listeners hung on its
/// matches, in sync with a changing tree.
///
/// Cloning a `LiveQuery` creates a new handle to the **same** query.
pub struct LiveQuery<H: Host> {
    shared: Rc<Shared<H>>,
}

impl<H: Host> Clone for LiveQuery<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<H: Host> std::fmt::Debug for LiveQuery<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("LiveQuery")
            .field("selector", &self.shared.selector)
            .field("mode", &self.shared.mode)
            .field("matched", &state.matched)
            .field("direct_listeners", &state.direct.len())
            .field("delegated_listeners", &state.delegated.len())
            .field("paused", &state.paused)
            .field("disposed", &state.disposed)
            .finish()
    }
}

fn check_event_type(event: &str) -> Result<()> {
    if event.is_empty() {
        return Err(Error::InvalidArgument("event type must not be empty"));
    }
    Ok(())
}

impl<H: Host> LiveQuery<H> {
    /// Create a query, run the initial match, and start observing `parent`.
    ///
    /// With no parent the matched state stays empty until the query is
    /// re-pointed (see [`LiveQuery::nested`]).
    pub fn new(
        host: H,
        mode: Mode,
        selector: impl Into<String>,
        parent: Option<H::Node>,
        config: ObserverConfig,
    ) -> Result<Self> {
        let selector = selector.into();
        host.validate_selector(&selector)?;
        let query = Self {
            shared: Rc::new(Shared {
                host,
                selector,
                mode,
                config,
                state: RefCell::new(State {
                    parent,
                    matched: Matched::empty(mode),
                    direct: DirectListeners::default(),
                    delegated: DelegatedListeners::default(),
                    subscribers: Subscribers::default(),
                    observation: None,
                    upstream: None,
                    paused: false,
                    disposed: false,
                }),
            }),
        };
        query.refresh();
        query.start_observing();
        Ok(query)
    }

    /// Query tracking the first match under `parent`.
    pub fn single(
        host: H,
        selector: impl Into<String>,
        parent: Option<H::Node>,
        config: ObserverConfig,
    ) -> Result<Self> {
        Self::new(host, Mode::Single, selector, parent, config)
    }

    /// Query tracking every match under `parent`.
    pub fn collection(
        host: H,
        selector: impl Into<String>,
        parent: Option<H::Node>,
        config: ObserverConfig,
    ) -> Result<Self> {
        Self::new(host, Mode::Collection, selector, parent, config)
    }

    /// Query whose parent is the current match of `upstream`.
    ///
    /// Whenever `upstream` fires `update` and its primary node (the single
    /// match, or the first of a collection) has changed, this query pauses,
    /// re-points its parent, and resumes, which refreshes it. Chains of
    /// nested queries reconcile top-down this way.
    pub fn nested(
        mode: Mode,
        selector: impl Into<String>,
        upstream: &LiveQuery<H>,
        config: ObserverConfig,
    ) -> Result<Self> {
        let query = Self::new(
            upstream.shared.host.clone(),
            mode,
            selector,
            upstream.item(),
            config,
        )?;

        let child: Weak<Shared<H>> = Rc::downgrade(&query.shared);
        let source: Weak<Shared<H>> = Rc::downgrade(&upstream.shared);
        let subscriber: Subscriber<H::Node> = Rc::new(move |_: &Notification<H::Node>| {
            let (Some(child), Some(source)) = (child.upgrade(), source.upgrade()) else {
                return;
            };
            let primary = LiveQuery { shared: source }.item();
            LiveQuery { shared: child }.repoint(primary);
        });
        upstream.on(LifecycleEvent::Update, Rc::clone(&subscriber));
        query.shared.state.borrow_mut().upstream = Some(Upstream {
            query: upstream.clone(),
            subscriber,
        });
        Ok(query)
    }

    // ── Accessors ──────────────────────────────────────────────────────

    #[must_use]
    pub fn selector(&self) -> &str {
        &self.shared.selector
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.shared.mode
    }

    #[must_use]
    pub fn config(&self) -> ObserverConfig {
        self.shared.config
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.shared.host
    }

    #[must_use]
    pub fn parent(&self) -> Option<H::Node> {
        self.shared.state.borrow().parent.clone()
    }

    /// The single match, or the first node of a collection.
    #[must_use]
    pub fn item(&self) -> Option<H::Node> {
        self.shared.state.borrow().matched.nodes().first().cloned()
    }

    /// Every matched node, in document order.
    #[must_use]
    pub fn items(&self) -> Vec<H::Node> {
        self.shared.state.borrow().matched.nodes().to_vec()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.borrow().matched.nodes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `f` on every matched node. `f` may freely use the query.
    pub fn for_each(&self, mut f: impl FnMut(&H::Node)) {
        for node in &self.items() {
            f(node);
        }
    }

    /// Map every matched node, in document order.
    pub fn map<R>(&self, f: impl FnMut(&H::Node) -> R) -> Vec<R> {
        self.items().iter().map(f).collect()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.state.borrow().paused
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.state.borrow().disposed
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.shared.state.borrow().observation.is_some()
    }

    /// Whether delegated listeners are currently attached.
    #[must_use]
    pub fn delegated_active(&self) -> bool {
        self.shared.state.borrow().delegated.is_active()
    }

    #[must_use]
    pub fn has_event_listener(&self, event: &str, listener: &H::Listener) -> bool {
        self.shared.state.borrow().direct.contains(event, listener)
    }

    #[must_use]
    pub fn subscriber_count(&self, event: LifecycleEvent) -> usize {
        self.shared.state.borrow().subscribers.count(event)
    }

    // ── Lifecycle subscriptions ────────────────────────────────────────

    /// Subscribe to a lifecycle event.
    pub fn on(&self, event: LifecycleEvent, subscriber: Subscriber<H::Node>) -> &Self {
        self.shared
            .state
            .borrow_mut()
            .subscribers
            .add(event, subscriber);
        self
    }

    /// Remove the first registration of `subscriber` under `event`.
    pub fn off(&self, event: LifecycleEvent, subscriber: &Subscriber<H::Node>) -> &Self {
        self.shared
            .state
            .borrow_mut()
            .subscribers
            .remove(event, subscriber);
        self
    }

    /// [`on`](Self::on) keyed by wire name, e.g. `"eventListeners:add"`.
    pub fn on_named(&self, event: &str, subscriber: Subscriber<H::Node>) -> Result<&Self> {
        let event: LifecycleEvent = event.parse()?;
        Ok(self.on(event, subscriber))
    }

    /// [`off`](Self::off) keyed by wire name.
    pub fn off_named(&self, event: &str, subscriber: &Subscriber<H::Node>) -> Result<&Self> {
        let event: LifecycleEvent = event.parse()?;
        Ok(self.off(event, subscriber))
    }

    fn emit(&self, notification: Notification<H::Node>) {
        let subscribers = self
            .shared
            .state
            .borrow()
            .subscribers
            .snapshot(notification.event());
        for subscriber in &subscribers {
            subscriber(&notification);
        }
    }

    fn signal(&self, event: LifecycleEvent) {
        self.emit(Notification::Signal(event));
    }

    // ── Refresh / pause / resume ───────────────────────────────────────

    /// Re-evaluate the selector and reconcile listeners with the result.
    ///
    /// Safe to call at any time, including while paused. A no-op after
    /// [`dispose`](Self::dispose).
    pub fn refresh(&self) {
        let host = &self.shared.host;
        let selector = self.shared.selector.as_str();
        let mut pending = Vec::new();
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            if state.disposed {
                return;
            }
            let listening = !state.direct.is_empty();
            let update = match &mut state.matched {
                Matched::Single(item) => {
                    let selected = state
                        .parent
                        .as_ref()
                        .and_then(|parent| host.query_first(parent, selector));
                    if diff_single(item.as_ref(), selected.as_ref()) {
                        if let Some(old) = item.as_ref() {
                            state.direct.detach_from(host, old);
                            if listening {
                                pending.push(Notification::Signal(
                                    LifecycleEvent::EventListenersDetach,
                                ));
                            }
                        }
                        if let Some(new) = selected.as_ref() {
                            state.direct.attach_to(host, new);
                            if listening {
                                pending.push(Notification::Signal(
                                    LifecycleEvent::EventListenersAttach,
                                ));
                            }
                        }
                        let previous = std::mem::replace(item, selected.clone());
                        Some(Update::Single {
                            current: selected,
                            previous,
                        })
                    } else {
                        None
                    }
                }
                Matched::Collection(items) => {
                    let selected = state
                        .parent
                        .as_ref()
                        .map(|parent| host.query_all(parent, selector))
                        .unwrap_or_default();
                    let delta = diff_collection(items.as_slice(), &selected);
                    if delta.is_empty() {
                        None
                    } else {
                        for node in &delta.left {
                            state.direct.detach_from(host, node);
                        }
                        if listening && !delta.left.is_empty() {
                            pending.push(Notification::Signal(LifecycleEvent::EventListenersDetach));
                        }
                        for node in &delta.entered {
                            state.direct.attach_to(host, node);
                        }
                        if listening && !delta.entered.is_empty() {
                            pending.push(Notification::Signal(LifecycleEvent::EventListenersAttach));
                        }
                        *items = selected;
                        Some(Update::Collection {
                            entered: delta.entered,
                            left: delta.left,
                        })
                    }
                }
            };
            if let Some(update) = update {
                trace!(
                    selector,
                    entered = update.entered().len(),
                    left = update.left().len(),
                    "live query changed"
                );
                pending.push(Notification::Update(update));
            }
        }

        for notification in pending {
            self.emit(notification);
        }
        self.reconcile_delegated();
    }

    /// Attach delegated listeners iff something is matched.
    fn reconcile_delegated(&self) {
        let toggled = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            if state.disposed {
                return;
            }
            let host = &self.shared.host;
            if state.matched.nodes().is_empty() {
                state
                    .delegated
                    .deactivate(host)
                    .then_some(LifecycleEvent::DelegatedEventListenersDetach)
            } else {
                state
                    .delegated
                    .activate(host)
                    .then_some(LifecycleEvent::DelegatedEventListenersAttach)
            }
        };
        if let Some(event) = toggled {
            self.signal(event);
        }
    }

    /// Entry point for host mutation batches.
    fn on_mutations(&self) {
        let skip = {
            let state = self.shared.state.borrow();
            state.paused || state.disposed
        };
        if skip {
            trace!(selector = %self.shared.selector, "mutation batch ignored while paused");
            return;
        }
        self.refresh();
    }

    /// Subscribe to the host if there is a parent and no live subscription.
    fn start_observing(&self) {
        let started = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            if state.disposed || state.observation.is_some() {
                return;
            }
            let Some(parent) = state.parent.as_ref() else {
                return;
            };
            let weak = Rc::downgrade(&self.shared);
            let callback: RefreshCallback = Rc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    LiveQuery { shared }.on_mutations();
                }
            });
            state.observation = self
                .shared
                .host
                .observe(parent, self.shared.config, callback);
            state.observation.is_some()
        };
        if started {
            debug!(selector = %self.shared.selector, "observing");
            self.signal(LifecycleEvent::Start);
        }
    }

    fn stop_observing(&self) {
        let observation = self.shared.state.borrow_mut().observation.take();
        if let Some(observation) = observation {
            self.shared.host.disconnect(observation);
        }
    }

    /// Suspend automatic refreshes. Fires `pause` when not already paused.
    pub fn pause(&self) -> &Self {
        let transitioned = {
            let mut state = self.shared.state.borrow_mut();
            if state.paused || state.disposed {
                false
            } else {
                state.paused = true;
                true
            }
        };
        if transitioned {
            self.stop_observing();
            debug!(selector = %self.shared.selector, "paused");
            self.signal(LifecycleEvent::Pause);
        }
        self
    }

    /// Re-subscribe (if there is a parent), fire `resume`, then refresh once
    /// to pick up whatever changed while paused.
    pub fn resume(&self) -> &Self {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.disposed {
                return self;
            }
            state.paused = false;
        }
        self.start_observing();
        debug!(selector = %self.shared.selector, "resumed");
        self.signal(LifecycleEvent::Resume);
        self.refresh();
        self
    }

    /// Point the query at a new parent node.
    ///
    /// A paused query only records the new parent; its next `resume`
    /// refreshes against it.
    pub fn repoint(&self, parent: Option<H::Node>) {
        let (unchanged, was_paused) = {
            let state = self.shared.state.borrow();
            (state.parent == parent, state.paused)
        };
        if unchanged || self.is_disposed() {
            return;
        }
        debug!(selector = %self.shared.selector, ?parent, "re-pointing parent");
        if was_paused {
            self.shared.state.borrow_mut().parent = parent;
            return;
        }
        self.pause();
        self.shared.state.borrow_mut().parent = parent;
        self.resume();
    }

    /// Stop observing, detach and forget every listener, drop subscribers,
    /// and unlink from an upstream query. Idempotent.
    pub fn dispose(&self) {
        let host = &self.shared.host;
        let (observation, upstream) = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            if state.disposed {
                return;
            }
            state.disposed = true;
            for node in state.matched.nodes() {
                state.direct.detach_from(host, node);
            }
            state.direct.clear();
            state.delegated.purge(host);
            state.matched.clear();
            state.subscribers.clear();
            (state.observation.take(), state.upstream.take())
        };
        if let Some(observation) = observation {
            host.disconnect(observation);
        }
        if let Some(upstream) = upstream {
            upstream
                .query
                .off(LifecycleEvent::Update, &upstream.subscriber);
        }
        debug!(selector = %self.shared.selector, "disposed");
    }

    // ── Direct listeners ───────────────────────────────────────────────

    /// Register `listener` for `event` on every matched node, now and later.
    pub fn add_event_listener(
        &self,
        event: &str,
        listener: H::Listener,
        passive: bool,
    ) -> Result<&Self> {
        check_event_type(event)?;
        if !self.shared.host.is_callable(&listener) {
            return Err(Error::InvalidArgument("listener is not callable"));
        }
        let added = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            let options = ListenerOptions::direct(passive);
            let added = state.direct.insert(event, listener.clone(), options);
            if added {
                for node in state.matched.nodes() {
                    let target: H::Target = node.clone().into();
                    self.shared
                        .host
                        .add_listener(&target, event, &listener, options);
                }
            }
            added
        };
        if added {
            self.signal(LifecycleEvent::EventListenersAdd);
        }
        Ok(self)
    }

    /// Unregister `listener` and detach it from every matched node.
    pub fn remove_event_listener(&self, event: &str, listener: &H::Listener) -> Result<&Self> {
        if !self.shared.host.is_callable(listener) {
            return Err(Error::InvalidArgument("listener is not callable"));
        }
        let removed = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            let removed = state.direct.remove(event, listener);
            if let Some(entry) = &removed {
                for node in state.matched.nodes() {
                    let target: H::Target = node.clone().into();
                    self.shared
                        .host
                        .remove_listener(&target, event, &entry.listener, entry.options);
                }
            }
            removed.is_some()
        };
        if removed {
            self.signal(LifecycleEvent::EventListenersRemove);
        }
        Ok(self)
    }

    /// Attach every direct listener to every matched node.
    pub fn attach_event_listeners(&self) -> &Self {
        self.attach_event_listeners_to(&self.items())
    }

    /// Attach every direct listener to each of `nodes`. No-op when empty.
    pub fn attach_event_listeners_to(&self, nodes: &[H::Node]) -> &Self {
        if nodes.is_empty() {
            return self;
        }
        {
            let state = self.shared.state.borrow();
            for node in nodes {
                state.direct.attach_to(&self.shared.host, node);
            }
        }
        self.signal(LifecycleEvent::EventListenersAttach);
        self
    }

    /// Detach every direct listener from every matched node.
    pub fn detach_event_listeners(&self) -> &Self {
        self.detach_event_listeners_from(&self.items())
    }

    /// Detach every direct listener from each of `nodes`. No-op when empty.
    pub fn detach_event_listeners_from(&self, nodes: &[H::Node]) -> &Self {
        if nodes.is_empty() {
            return self;
        }
        {
            let state = self.shared.state.borrow();
            for node in nodes {
                state.direct.detach_from(&self.shared.host, node);
            }
        }
        self.signal(LifecycleEvent::EventListenersDetach);
        self
    }

    /// Detach every direct listener and empty the registry.
    pub fn purge_event_listeners(&self) -> &Self {
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            for node in state.matched.nodes() {
                state.direct.detach_from(&self.shared.host, node);
            }
            state.direct.clear();
        }
        self.signal(LifecycleEvent::EventListenersPurge);
        self
    }

    // ── Delegated listeners ────────────────────────────────────────────

    /// Register a listener on a node outside the matched set. It is attached
    /// only while something is matched.
    pub fn add_delegated_event_listener(
        &self,
        target: H::Target,
        event: &str,
        listener: H::Listener,
        options: ListenerOptions,
    ) -> Result<&Self> {
        self.check_delegated(&target, event, &listener)?;
        let added = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            let attach = !state.matched.nodes().is_empty();
            state
                .delegated
                .insert(&self.shared.host, target, event, listener, options, attach)
        };
        if added {
            self.signal(LifecycleEvent::DelegatedEventListenersAdd);
        }
        Ok(self)
    }

    pub fn remove_delegated_event_listener(
        &self,
        target: &H::Target,
        event: &str,
        listener: &H::Listener,
    ) -> Result<&Self> {
        self.check_delegated(target, event, listener)?;
        let removed = self.shared.state.borrow_mut().delegated.remove(
            &self.shared.host,
            target,
            event,
            listener,
        );
        if removed {
            self.signal(LifecycleEvent::DelegatedEventListenersRemove);
        }
        Ok(self)
    }

    fn check_delegated(&self, target: &H::Target, event: &str, listener: &H::Listener) -> Result<()> {
        check_event_type(event)?;
        if !self.shared.host.is_event_target(target) {
            return Err(Error::InvalidArgument(
                "target is not a node, window, or document",
            ));
        }
        if !self.shared.host.is_callable(listener) {
            return Err(Error::InvalidArgument("listener is not callable"));
        }
        Ok(())
    }

    /// Attach every delegated listener. Fires only on a state change.
    pub fn attach_delegated_event_listeners(&self) -> &Self {
        let attached = self
            .shared
            .state
            .borrow_mut()
            .delegated
            .activate(&self.shared.host);
        if attached {
            self.signal(LifecycleEvent::DelegatedEventListenersAttach);
        }
        self
    }

    /// Detach every delegated listener. Fires only on a state change.
    pub fn detach_delegated_event_listeners(&self) -> &Self {
        let detached = self
            .shared
            .state
            .borrow_mut()
            .delegated
            .deactivate(&self.shared.host);
        if detached {
            self.signal(LifecycleEvent::DelegatedEventListenersDetach);
        }
        self
    }

    /// Detach every delegated listener and empty the registry.
    pub fn purge_delegated_event_listeners(&self) -> &Self {
        self.shared
            .state
            .borrow_mut()
            .delegated
            .purge(&self.shared.host);
        self.signal(LifecycleEvent::DelegatedEventListenersPurge);
        self
    }
}
