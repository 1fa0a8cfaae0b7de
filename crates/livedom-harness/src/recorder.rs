#![forbid(unsafe_code)]

//! Subscriber that records lifecycle notifications for later assertions.

use std::cell::RefCell;
use std::rc::Rc;

use livedom_core::{Host, LifecycleEvent, LiveQuery, Notification, Subscriber, Update};

/// Records every notification it receives, in order.
pub struct Recorder<N> {
    log: Rc<RefCell<Vec<Notification<N>>>>,
    subscriber: Subscriber<N>,
}

impl<N: Clone + 'static> Recorder<N> {
    #[must_use]
    pub fn new() -> Self {
        let log: Rc<RefCell<Vec<Notification<N>>>> = Rc::default();
        let sink = Rc::clone(&log);
        let subscriber: Subscriber<N> = Rc::new(move |n: &Notification<N>| {
            sink.borrow_mut().push(n.clone());
        });
        Self { log, subscriber }
    }

    /// Subscribe to every lifecycle event of `query`.
    pub fn attach<H: Host<Node = N>>(&self, query: &LiveQuery<H>) {
        for event in LifecycleEvent::ALL {
            query.on(event, Rc::clone(&self.subscriber));
        }
    }

    /// Subscribe to a subset of events.
    pub fn attach_to<H: Host<Node = N>>(&self, query: &LiveQuery<H>, events: &[LifecycleEvent]) {
        for event in events {
            query.on(*event, Rc::clone(&self.subscriber));
        }
    }

    #[must_use]
    pub fn subscriber(&self) -> Subscriber<N> {
        Rc::clone(&self.subscriber)
    }

    /// Event kinds received so far.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.log.borrow().iter().map(Notification::event).collect()
    }

    /// `update` payloads received so far.
    #[must_use]
    pub fn updates(&self) -> Vec<Update<N>> {
        self.log
            .borrow()
            .iter()
            .filter_map(|n| n.update().cloned())
            .collect()
    }

    #[must_use]
    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|n| n.event() == event)
            .count()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl<N: Clone + 'static> Default for Recorder<N> {
    fn default() -> Self {
        Self::new()
    }
}
