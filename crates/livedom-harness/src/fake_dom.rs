#![forbid(unsafe_code)]

//! In-memory [`Host`] for deterministic tests.
//!
//! # Design
//!
//! [`FakeHost`] owns a small element tree behind `Rc<RefCell<..>>`. Tree
//! edits record which observers they concern; nothing is delivered until
//! the test calls [`FakeHost::flush`], which invokes each concerned observer
//! once, mimicking a host that batches mutation records.
//!
//! Listener registrations land in a ledger with browser semantics: a second
//! registration of the same `(target, event, listener, capture)` is ignored.
//!
//! # Invariants
//!
//! 1. `flush` delivers at most one callback per observer per call.
//! 2. Mutations recorded during a flush are delivered by the next flush.
//! 3. Dropping a [`FakeObservation`] unregisters its observer and discards
//!    its pending batch.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use livedom_core::{Error, Host, ListenerOptions, ObserverConfig, RefreshCallback, Result};
use tracing::trace;

use crate::selector::Selector;

/// Handle to an element of the fake tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Listener targets understood by the fake host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeTarget {
    Node(NodeId),
    Window,
    Document,
    /// A value that is not an event target at all.
    Object,
}

impl From<NodeId> for FakeTarget {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

/// A listener identity. Two listeners are the same iff their ids match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeListener {
    id: u32,
    callable: bool,
}

impl FakeListener {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, callable: true }
    }

    /// A value the host refuses to treat as a callback.
    #[must_use]
    pub fn not_callable(id: u32) -> Self {
        Self {
            id,
            callable: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// One live entry in the listener ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub target: FakeTarget,
    pub event: String,
    pub listener: FakeListener,
    pub options: ListenerOptions,
}

/// Traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Selector evaluations (`query_all` + `query_first`).
    pub queries: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
    /// Observations ever established.
    pub observations: usize,
    /// Observer callbacks delivered by `flush`.
    pub batches_delivered: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

#[derive(Debug)]
struct FakeElement {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct ObserverSlot {
    id: u64,
    root: NodeId,
    config: ObserverConfig,
    callback: RefreshCallback,
}

#[derive(Default)]
struct Dom {
    elements: Vec<FakeElement>,
    observers: Vec<ObserverSlot>,
    next_observer: u64,
    pending: BTreeSet<u64>,
    registrations: Vec<Registration>,
    stats: HostStats,
}

impl Dom {
    fn element(&self, node: NodeId) -> &FakeElement {
        &self.elements[node.0]
    }

    fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.element(current).parent;
        }
        false
    }

    fn record(&mut self, target: NodeId, kind: MutationKind) {
        let concerned: Vec<u64> = self
            .observers
            .iter()
            .filter(|o| match kind {
                MutationKind::ChildList => o.config.child_list,
                MutationKind::Attributes => o.config.attributes,
                MutationKind::CharacterData => o.config.character_data,
            })
            .filter(|o| {
                target == o.root || (o.config.subtree && self.is_inclusive_descendant(target, o.root))
            })
            .map(|o| o.id)
            .collect();
        self.pending.extend(concerned);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.elements[node.0].parent.take() {
            self.elements[parent.0].children.retain(|c| *c != node);
            self.record(parent, MutationKind::ChildList);
        }
    }

    fn descendants(&self, root: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.element(root).children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn matches(&self, selector: &Selector, node: NodeId) -> bool {
        let chain = std::iter::successors(Some(node), |n| self.element(*n).parent).map(|n| {
            let e = self.element(n);
            (e.tag.as_str(), e.id.as_deref(), e.classes.as_slice())
        });
        selector.matches(chain)
    }

    fn query(&self, parent: NodeId, selector: &str, first_only: bool) -> Vec<NodeId> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let mut candidates = Vec::new();
        self.descendants(parent, &mut candidates);
        let mut found = candidates
            .into_iter()
            .filter(|n| self.matches(&selector, *n));
        if first_only {
            found.next().into_iter().collect()
        } else {
            found.collect()
        }
    }
}

/// Live subscription handed out by [`FakeHost::observe`](Host::observe).
pub struct FakeObservation {
    id: u64,
    dom: Weak<RefCell<Dom>>,
}

impl Drop for FakeObservation {
    fn drop(&mut self) {
        let Some(dom) = self.dom.upgrade() else {
            return;
        };
        if let Ok(mut dom) = dom.try_borrow_mut() {
            dom.observers.retain(|o| o.id != self.id);
            dom.pending.remove(&self.id);
        }
    }
}

/// Deterministic in-memory host. Clones share the same tree.
#[derive(Clone)]
pub struct FakeHost {
    dom: Rc<RefCell<Dom>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FakeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dom = self.dom.borrow();
        f.debug_struct("FakeHost")
            .field("elements", &dom.elements.len())
            .field("observers", &dom.observers.len())
            .field("registrations", &dom.registrations.len())
            .field("stats", &dom.stats)
            .finish()
    }
}

impl FakeHost {
    /// A tree holding a single `html` root element.
    #[must_use]
    pub fn new() -> Self {
        let host = Self {
            dom: Rc::new(RefCell::new(Dom::default())),
        };
        host.create_element("html", &[]);
        host
    }

    /// The document root element.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str, classes: &[&str]) -> NodeId {
        let mut dom = self.dom.borrow_mut();
        let node = NodeId(dom.elements.len());
        dom.elements.push(FakeElement {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: classes.iter().map(|c| (*c).to_owned()).collect(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        });
        node
    }

    /// Create an element and append it to `parent`.
    pub fn append(&self, parent: NodeId, tag: &str, classes: &[&str]) -> NodeId {
        let node = self.create_element(tag, classes);
        self.append_child(parent, node);
        node
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut dom = self.dom.borrow_mut();
        dom.detach(child);
        dom.elements[child.0].parent = Some(parent);
        dom.elements[parent.0].children.push(child);
        dom.record(parent, MutationKind::ChildList);
    }

    /// Insert `child` before `reference` (which must be a child of `parent`);
    /// appends if `reference` is not found.
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: NodeId) {
        let mut dom = self.dom.borrow_mut();
        dom.detach(child);
        let at = dom.elements[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(dom.elements[parent.0].children.len());
        dom.elements[child.0].parent = Some(parent);
        dom.elements[parent.0].children.insert(at, child);
        dom.record(parent, MutationKind::ChildList);
    }

    /// Detach `node` (with its subtree) from the tree.
    pub fn remove(&self, node: NodeId) {
        self.dom.borrow_mut().detach(node);
    }

    /// Put `replacement` where `old` was and detach `old`.
    pub fn replace(&self, old: NodeId, replacement: NodeId) {
        let parent = self.parent_of(old);
        match parent {
            Some(parent) => {
                self.insert_before(parent, replacement, old);
                self.remove(old);
            }
            None => self.remove(replacement),
        }
    }

    pub fn set_id(&self, node: NodeId, id: Option<&str>) {
        let mut dom = self.dom.borrow_mut();
        dom.elements[node.0].id = id.map(str::to_owned);
        dom.record(node, MutationKind::Attributes);
    }

    pub fn set_classes(&self, node: NodeId, classes: &[&str]) {
        let mut dom = self.dom.borrow_mut();
        dom.elements[node.0].classes = classes.iter().map(|c| (*c).to_owned()).collect();
        dom.record(node, MutationKind::Attributes);
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        let mut dom = self.dom.borrow_mut();
        dom.elements[node.0].text = text.to_owned();
        dom.record(node, MutationKind::CharacterData);
    }

    #[must_use]
    pub fn text(&self, node: NodeId) -> String {
        self.dom.borrow().element(node).text.clone()
    }

    #[must_use]
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.dom.borrow().element(node).parent
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.dom.borrow().element(node).children.clone()
    }

    /// Deliver pending mutation batches. Returns the number of observer
    /// callbacks invoked.
    pub fn flush(&self) -> usize {
        let callbacks: Vec<RefreshCallback> = {
            let mut dom = self.dom.borrow_mut();
            let pending = std::mem::take(&mut dom.pending);
            let callbacks: Vec<RefreshCallback> = dom
                .observers
                .iter()
                .filter(|o| pending.contains(&o.id))
                .map(|o| Rc::clone(&o.callback))
                .collect();
            dom.stats.batches_delivered += callbacks.len();
            callbacks
        };
        trace!(batches = callbacks.len(), "flushing mutation batches");
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    /// Flush until nothing is pending or `max_rounds` is reached. Returns the
    /// number of rounds that delivered anything.
    pub fn settle(&self, max_rounds: usize) -> usize {
        (0..max_rounds).take_while(|_| self.flush() > 0).count()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.dom.borrow().pending.is_empty()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.dom.borrow().observers.len()
    }

    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.dom.borrow().stats
    }

    /// Fresh evaluation that does not count towards [`HostStats::queries`].
    #[must_use]
    pub fn select_all(&self, parent: NodeId, selector: &str) -> Vec<NodeId> {
        self.dom.borrow().query(parent, selector, false)
    }

    #[must_use]
    pub fn registrations(&self) -> Vec<Registration> {
        self.dom.borrow().registrations.clone()
    }

    #[must_use]
    pub fn listeners_on(&self, target: &FakeTarget) -> Vec<Registration> {
        self.dom
            .borrow()
            .registrations
            .iter()
            .filter(|r| &r.target == target)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn has_listener(&self, target: &FakeTarget, event: &str, listener: &FakeListener) -> bool {
        self.dom
            .borrow()
            .registrations
            .iter()
            .any(|r| &r.target == target && r.event == event && &r.listener == listener)
    }

    /// Nodes carrying `listener` for `event`, in ledger order.
    #[must_use]
    pub fn nodes_with_listener(&self, event: &str, listener: &FakeListener) -> Vec<NodeId> {
        self.dom
            .borrow()
            .registrations
            .iter()
            .filter(|r| r.event == event && &r.listener == listener)
            .filter_map(|r| match r.target {
                FakeTarget::Node(node) => Some(node),
                _ => None,
            })
            .collect()
    }
}

impl Host for FakeHost {
    type Node = NodeId;
    type Target = FakeTarget;
    type Listener = FakeListener;
    type Observation = FakeObservation;

    fn query_all(&self, parent: &NodeId, selector: &str) -> Vec<NodeId> {
        let mut dom = self.dom.borrow_mut();
        dom.stats.queries += 1;
        dom.query(*parent, selector, false)
    }

    fn query_first(&self, parent: &NodeId, selector: &str) -> Option<NodeId> {
        let mut dom = self.dom.borrow_mut();
        dom.stats.queries += 1;
        dom.query(*parent, selector, true).into_iter().next()
    }

    fn observe(
        &self,
        parent: &NodeId,
        config: ObserverConfig,
        callback: RefreshCallback,
    ) -> Option<FakeObservation> {
        if !config.watches_anything() {
            return None;
        }
        let mut dom = self.dom.borrow_mut();
        let id = dom.next_observer;
        dom.next_observer += 1;
        dom.stats.observations += 1;
        dom.observers.push(ObserverSlot {
            id,
            root: *parent,
            config,
            callback,
        });
        Some(FakeObservation {
            id,
            dom: Rc::downgrade(&self.dom),
        })
    }

    fn add_listener(
        &self,
        target: &FakeTarget,
        event: &str,
        listener: &FakeListener,
        options: ListenerOptions,
    ) {
        let mut dom = self.dom.borrow_mut();
        let duplicate = dom.registrations.iter().any(|r| {
            &r.target == target
                && r.event == event
                && &r.listener == listener
                && r.options.capture == options.capture
        });
        if duplicate {
            return;
        }
        dom.stats.listeners_added += 1;
        dom.registrations.push(Registration {
            target: target.clone(),
            event: event.to_owned(),
            listener: listener.clone(),
            options,
        });
    }

    fn remove_listener(
        &self,
        target: &FakeTarget,
        event: &str,
        listener: &FakeListener,
        options: ListenerOptions,
    ) {
        let mut dom = self.dom.borrow_mut();
        let position = dom.registrations.iter().position(|r| {
            &r.target == target
                && r.event == event
                && &r.listener == listener
                && r.options.capture == options.capture
        });
        if let Some(position) = position {
            dom.registrations.remove(position);
            dom.stats.listeners_removed += 1;
        }
    }

    fn validate_selector(&self, selector: &str) -> Result<()> {
        Selector::parse(selector)
            .map(|_| ())
            .map_err(|_| Error::InvalidSelector(selector.to_owned()))
    }

    fn is_event_target(&self, target: &FakeTarget) -> bool {
        !matches!(target, FakeTarget::Object)
    }

    fn is_callable(&self, listener: &FakeListener) -> bool {
        listener.callable
    }
}
