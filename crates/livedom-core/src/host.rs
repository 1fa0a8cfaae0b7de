#![forbid(unsafe_code)]

//! The capabilities a live query borrows from its environment.
//!
//! A [`Host`] evaluates selectors, reports subtree mutations, and attaches
//! listeners. The browser adapter implements it over `web-sys`; the test
//! harness implements it over an in-memory tree so mutation batches can be
//! delivered deterministically.

use std::fmt::Debug;
use std::rc::Rc;

use crate::config::{ListenerOptions, ObserverConfig};
use crate::error::Result;

/// Callback a host invokes after a batch of watched mutations.
pub type RefreshCallback = Rc<dyn Fn()>;

/// Environment capabilities consumed by [`LiveQuery`](crate::LiveQuery).
///
/// Handles are cheap to clone. Nested queries clone the host of the query
/// they hang off.
pub trait Host: Clone + 'static {
    /// A matchable node. Equality must be identity, not structure.
    type Node: Clone + PartialEq + Debug + Into<Self::Target> + 'static;
    /// Anything a listener can be registered on: a node, the window, the document.
    type Target: Clone + PartialEq + Debug + 'static;
    /// A listener callback. Equality must be identity.
    type Listener: Clone + PartialEq + Debug + 'static;
    /// A live mutation subscription. Dropping it must stop delivery.
    type Observation: 'static;

    /// All descendants of `parent` matching `selector`, in document order.
    fn query_all(&self, parent: &Self::Node, selector: &str) -> Vec<Self::Node>;

    /// First descendant of `parent` matching `selector`.
    fn query_first(&self, parent: &Self::Node, selector: &str) -> Option<Self::Node>;

    /// Start delivering mutation batches under `parent` to `callback`.
    ///
    /// Returns `None` if the subscription could not be established.
    fn observe(
        &self,
        parent: &Self::Node,
        config: ObserverConfig,
        callback: RefreshCallback,
    ) -> Option<Self::Observation>;

    /// Stop delivering batches for `observation`.
    fn disconnect(&self, observation: Self::Observation) {
        drop(observation);
    }

    fn add_listener(
        &self,
        target: &Self::Target,
        event: &str,
        listener: &Self::Listener,
        options: ListenerOptions,
    );

    fn remove_listener(
        &self,
        target: &Self::Target,
        event: &str,
        listener: &Self::Listener,
        options: ListenerOptions,
    );

    /// Reject selectors the host cannot evaluate.
    fn validate_selector(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    /// Whether `target` is a node, window, or document capability.
    fn is_event_target(&self, _target: &Self::Target) -> bool {
        true
    }

    /// Whether `listener` can be invoked.
    fn is_callable(&self, _listener: &Self::Listener) -> bool {
        true
    }
}
