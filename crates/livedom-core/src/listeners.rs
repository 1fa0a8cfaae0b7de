#![forbid(unsafe_code)]

//! Direct and delegated listener registries.
//!
//! Registries only track what *should* be attached. Attachment itself goes
//! through the [`Host`], driven by [`LiveQuery`](crate::LiveQuery).
//!
//! # Invariants
//!
//! 1. A `(event, listener)` pair appears at most once among direct listeners.
//! 2. A `(target, event, listener)` triple appears at most once among
//!    delegated listeners.
//! 3. A delegated entry is attached on the host iff its `attached` flag is
//!    set. `activate`/`deactivate` bring every entry in line with `active`.

use std::collections::BTreeMap;

use crate::config::ListenerOptions;
use crate::host::Host;

#[derive(Debug, Clone)]
pub(crate) struct DirectListener<L> {
    pub(crate) listener: L,
    pub(crate) options: ListenerOptions,
}

/// Listeners cascaded onto every matched node, keyed by host event name.
#[derive(Debug)]
pub(crate) struct DirectListeners<L> {
    by_event: BTreeMap<String, Vec<DirectListener<L>>>,
}

impl<L> Default for DirectListeners<L> {
    fn default() -> Self {
        Self {
            by_event: BTreeMap::new(),
        }
    }
}

impl<L: Clone + PartialEq> DirectListeners<L> {
    /// Record a listener. Returns false if the pair was already registered.
    pub(crate) fn insert(&mut self, event: &str, listener: L, options: ListenerOptions) -> bool {
        let entries = self.by_event.entry(event.to_owned()).or_default();
        if entries.iter().any(|e| e.listener == listener) {
            return false;
        }
        entries.push(DirectListener { listener, options });
        true
    }

    pub(crate) fn remove(&mut self, event: &str, listener: &L) -> Option<DirectListener<L>> {
        let entries = self.by_event.get_mut(event)?;
        let pos = entries.iter().position(|e| &e.listener == listener)?;
        let removed = entries.remove(pos);
        if entries.is_empty() {
            self.by_event.remove(event);
        }
        Some(removed)
    }

    pub(crate) fn contains(&self, event: &str, listener: &L) -> bool {
        self.by_event
            .get(event)
            .is_some_and(|entries| entries.iter().any(|e| &e.listener == listener))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_event.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.by_event.clear();
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &DirectListener<L>)> {
        self.by_event
            .iter()
            .flat_map(|(event, entries)| entries.iter().map(move |e| (event.as_str(), e)))
    }

    /// Attach every registered listener to `node`.
    pub(crate) fn attach_to<H>(&self, host: &H, node: &H::Node)
    where
        H: Host<Listener = L>,
    {
        let target: H::Target = node.clone().into();
        for (event, entry) in self.iter() {
            host.add_listener(&target, event, &entry.listener, entry.options);
        }
    }

    /// Detach every registered listener from `node`.
    pub(crate) fn detach_from<H>(&self, host: &H, node: &H::Node)
    where
        H: Host<Listener = L>,
    {
        let target: H::Target = node.clone().into();
        for (event, entry) in self.iter() {
            host.remove_listener(&target, event, &entry.listener, entry.options);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DelegatedListener<T, L> {
    pub(crate) target: T,
    pub(crate) listener: L,
    pub(crate) options: ListenerOptions,
    attached: bool,
}

/// Listeners on nodes outside the matched set, gated on the set being non-empty.
#[derive(Debug)]
pub(crate) struct DelegatedListeners<T, L> {
    by_event: BTreeMap<String, Vec<DelegatedListener<T, L>>>,
    active: bool,
}

impl<T, L> Default for DelegatedListeners<T, L> {
    fn default() -> Self {
        Self {
            by_event: BTreeMap::new(),
            active: false,
        }
    }
}

impl<T: Clone + PartialEq, L: Clone + PartialEq> DelegatedListeners<T, L> {
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn len(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    /// Record a listener, attaching it right away when `attach` is set.
    /// Returns false if the triple was already registered.
    pub(crate) fn insert<H>(
        &mut self,
        host: &H,
        target: T,
        event: &str,
        listener: L,
        options: ListenerOptions,
        attach: bool,
    ) -> bool
    where
        H: Host<Target = T, Listener = L>,
    {
        let entries = self.by_event.entry(event.to_owned()).or_default();
        if entries
            .iter()
            .any(|e| e.target == target && e.listener == listener)
        {
            return false;
        }
        if attach {
            host.add_listener(&target, event, &listener, options);
        }
        entries.push(DelegatedListener {
            target,
            listener,
            options,
            attached: attach,
        });
        true
    }

    /// Forget a listener, detaching it first if it is attached.
    pub(crate) fn remove<H>(&mut self, host: &H, target: &T, event: &str, listener: &L) -> bool
    where
        H: Host<Target = T, Listener = L>,
    {
        let Some(entries) = self.by_event.get_mut(event) else {
            return false;
        };
        let Some(pos) = entries
            .iter()
            .position(|e| &e.target == target && &e.listener == listener)
        else {
            return false;
        };
        let removed = entries.remove(pos);
        if entries.is_empty() {
            self.by_event.remove(event);
        }
        if removed.attached {
            host.remove_listener(&removed.target, event, &removed.listener, removed.options);
        }
        true
    }

    /// Attach every detached entry. Returns true on the inactive → active
    /// transition.
    pub(crate) fn activate<H>(&mut self, host: &H) -> bool
    where
        H: Host<Target = T, Listener = L>,
    {
        for (event, entries) in &mut self.by_event {
            for e in entries.iter_mut().filter(|e| !e.attached) {
                host.add_listener(&e.target, event, &e.listener, e.options);
                e.attached = true;
            }
        }
        !std::mem::replace(&mut self.active, true)
    }

    /// Detach every attached entry. Returns true on the active → inactive
    /// transition.
    pub(crate) fn deactivate<H>(&mut self, host: &H) -> bool
    where
        H: Host<Target = T, Listener = L>,
    {
        for (event, entries) in &mut self.by_event {
            for e in entries.iter_mut().filter(|e| e.attached) {
                host.remove_listener(&e.target, event, &e.listener, e.options);
                e.attached = false;
            }
        }
        std::mem::replace(&mut self.active, false)
    }

    /// Detach everything and forget the registry.
    pub(crate) fn purge<H>(&mut self, host: &H)
    where
        H: Host<Target = T, Listener = L>,
    {
        self.deactivate(host);
        self.by_event.clear();
    }
}
