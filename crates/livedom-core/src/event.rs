#![forbid(unsafe_code)]

//! Lifecycle events fired by a live query, and the subscriber registry.
//!
//! Lifecycle events are a closed set ([`LifecycleEvent`]). They are distinct
//! from the open-ended host event names (`"click"`, `"input"`, ...) used by
//! direct and delegated listeners, which are plain strings.
//!
//! # Invariants
//!
//! 1. Subscribers of one event are notified in registration order.
//! 2. `off` removes only the first registration of a callback, compared by
//!    `Rc` identity.
//! 3. Notification works on a snapshot, so a subscriber may call `on`/`off`
//!    (or anything else on the query) while being notified.

use std::rc::Rc;
use std::str::FromStr;

use crate::error::Error;

/// The fixed set of lifecycle events a subscriber can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleEvent {
    Update,
    Start,
    Pause,
    Resume,
    EventListenersAdd,
    EventListenersRemove,
    EventListenersAttach,
    EventListenersDetach,
    EventListenersPurge,
    DelegatedEventListenersAdd,
    DelegatedEventListenersRemove,
    DelegatedEventListenersAttach,
    DelegatedEventListenersDetach,
    DelegatedEventListenersPurge,
}

impl LifecycleEvent {
    pub const ALL: [Self; 14] = [
        Self::Update,
        Self::Start,
        Self::Pause,
        Self::Resume,
        Self::EventListenersAdd,
        Self::EventListenersRemove,
        Self::EventListenersAttach,
        Self::EventListenersDetach,
        Self::EventListenersPurge,
        Self::DelegatedEventListenersAdd,
        Self::DelegatedEventListenersRemove,
        Self::DelegatedEventListenersAttach,
        Self::DelegatedEventListenersDetach,
        Self::DelegatedEventListenersPurge,
    ];

    /// Wire name of the event, e.g. `"eventListeners:add"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::EventListenersAdd => "eventListeners:add",
            Self::EventListenersRemove => "eventListeners:remove",
            Self::EventListenersAttach => "eventListeners:attach",
            Self::EventListenersDetach => "eventListeners:detach",
            Self::EventListenersPurge => "eventListeners:purge",
            Self::DelegatedEventListenersAdd => "delegatedEventListeners:add",
            Self::DelegatedEventListenersRemove => "delegatedEventListeners:remove",
            Self::DelegatedEventListenersAttach => "delegatedEventListeners:attach",
            Self::DelegatedEventListenersDetach => "delegatedEventListeners:detach",
            Self::DelegatedEventListenersPurge => "delegatedEventListeners:purge",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LifecycleEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| Error::UnknownEvent(s.to_owned()))
    }
}

/// Payload of the `update` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<N> {
    /// The single match changed from `previous` to `current`.
    Single {
        current: Option<N>,
        previous: Option<N>,
    },
    /// Nodes that entered and left the matched set, in document order.
    Collection { entered: Vec<N>, left: Vec<N> },
}

impl<N> Update<N> {
    /// Nodes that joined the matched set.
    #[must_use]
    pub fn entered(&self) -> &[N] {
        match self {
            Self::Single { current, .. } => current.as_slice(),
            Self::Collection { entered, .. } => entered,
        }
    }

    /// Nodes that dropped out of the matched set.
    #[must_use]
    pub fn left(&self) -> &[N] {
        match self {
            Self::Single { previous, .. } => previous.as_slice(),
            Self::Collection { left, .. } => left,
        }
    }
}

/// What a subscriber receives. Only `update` carries data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<N> {
    Update(Update<N>),
    Signal(LifecycleEvent),
}

impl<N> Notification<N> {
    #[must_use]
    pub fn event(&self) -> LifecycleEvent {
        match self {
            Self::Update(_) => LifecycleEvent::Update,
            Self::Signal(event) => *event,
        }
    }

    #[must_use]
    pub fn update(&self) -> Option<&Update<N>> {
        match self {
            Self::Update(update) => Some(update),
            Self::Signal(_) => None,
        }
    }
}

/// A lifecycle subscriber. Keep the `Rc` around to pass it to `off` later.
pub type Subscriber<N> = Rc<dyn Fn(&Notification<N>)>;

/// Per-event subscriber lists, one slot for every [`LifecycleEvent`].
pub(crate) struct Subscribers<N> {
    slots: [Vec<Subscriber<N>>; 14],
}

impl<N> Default for Subscribers<N> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| Vec::new()),
        }
    }
}

impl<N> Subscribers<N> {
    pub(crate) fn add(&mut self, event: LifecycleEvent, subscriber: Subscriber<N>) {
        self.slots[event.index()].push(subscriber);
    }

    pub(crate) fn remove(&mut self, event: LifecycleEvent, subscriber: &Subscriber<N>) -> bool {
        let slot = &mut self.slots[event.index()];
        match slot.iter().position(|s| Rc::ptr_eq(s, subscriber)) {
            Some(pos) => {
                slot.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Clone out the current subscribers so callbacks run without a borrow.
    pub(crate) fn snapshot(&self, event: LifecycleEvent) -> Vec<Subscriber<N>> {
        self.slots[event.index()].clone()
    }

    pub(crate) fn count(&self, event: LifecycleEvent) -> usize {
        self.slots[event.index()].len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(Vec::clear);
    }
}
