#![forbid(unsafe_code)]

//! [`Host`] over the browser DOM.
//!
//! Only compiled on `wasm32` targets.

use js_sys::{Array, Function};
use livedom_core::{
    Error, Host, ListenerOptions, LiveQuery, ObserverConfig, RefreshCallback, Result,
};
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Document, Element, EventTarget, MutationObserver,
    MutationObserverInit, Node, Window,
};

/// Browser host bound to one document.
#[derive(Debug, Clone, PartialEq)]
pub struct WebHost {
    document: Document,
}

impl WebHost {
    /// Host for the current window's document, if there is one.
    #[must_use]
    pub fn new() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self::from_document(document))
    }

    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The `<html>` element, the default parent for top-level queries.
    #[must_use]
    pub fn document_root(&self) -> Option<Element> {
        self.document.document_element()
    }

    /// Collection query over the whole document.
    pub fn collection(&self, selector: &str, config: ObserverConfig) -> Result<LiveQuery<Self>> {
        LiveQuery::collection(self.clone(), selector, self.document_root(), config)
    }

    /// Single-element query over the whole document.
    pub fn single(&self, selector: &str, config: ObserverConfig) -> Result<LiveQuery<Self>> {
        LiveQuery::single(self.clone(), selector, self.document_root(), config)
    }
}

/// A connected `MutationObserver` and the closure it calls.
///
/// Dropping it disconnects the observer before the closure is freed.
pub struct WebObservation {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl Drop for WebObservation {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

fn observer_init(config: ObserverConfig) -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_child_list(config.child_list);
    init.set_subtree(config.subtree);
    init.set_attributes(config.attributes);
    init.set_character_data(config.character_data);
    init
}

fn listener_options(options: ListenerOptions) -> AddEventListenerOptions {
    let init = AddEventListenerOptions::new();
    init.set_capture(options.capture);
    init.set_passive(options.passive);
    init.set_once(options.once);
    init
}

impl Host for WebHost {
    type Node = Element;
    type Target = JsValue;
    type Listener = JsValue;
    type Observation = WebObservation;

    fn query_all(&self, parent: &Element, selector: &str) -> Vec<Element> {
        let list = match parent.query_selector_all(selector) {
            Ok(list) => list,
            Err(err) => {
                warn!(selector, ?err, "querySelectorAll failed");
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn query_first(&self, parent: &Element, selector: &str) -> Option<Element> {
        parent.query_selector(selector).unwrap_or_else(|err| {
            warn!(selector, ?err, "querySelector failed");
            None
        })
    }

    fn observe(
        &self,
        parent: &Element,
        config: ObserverConfig,
        callback: RefreshCallback,
    ) -> Option<WebObservation> {
        let closure = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |_records: Array, _observer: MutationObserver| callback(),
        );
        let observer = match MutationObserver::new(closure.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!(?err, "MutationObserver construction failed");
                return None;
            }
        };
        if let Err(err) = observer.observe_with_options(parent, &observer_init(config)) {
            warn!(?err, "MutationObserver.observe failed");
            return None;
        }
        Some(WebObservation {
            observer,
            _callback: closure,
        })
    }

    fn add_listener(
        &self,
        target: &JsValue,
        event: &str,
        listener: &JsValue,
        options: ListenerOptions,
    ) {
        let (Some(target), Some(listener)) = (
            target.dyn_ref::<EventTarget>(),
            listener.dyn_ref::<Function>(),
        ) else {
            warn!(event, "skipping listener on a non-target or with a non-function");
            return;
        };
        if let Err(err) = target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            listener,
            &listener_options(options),
        ) {
            warn!(event, ?err, "addEventListener failed");
        }
    }

    fn remove_listener(
        &self,
        target: &JsValue,
        event: &str,
        listener: &JsValue,
        options: ListenerOptions,
    ) {
        let (Some(target), Some(listener)) = (
            target.dyn_ref::<EventTarget>(),
            listener.dyn_ref::<Function>(),
        ) else {
            return;
        };
        if let Err(err) =
            target.remove_event_listener_with_callback_and_bool(event, listener, options.capture)
        {
            warn!(event, ?err, "removeEventListener failed");
        }
    }

    fn validate_selector(&self, selector: &str) -> Result<()> {
        // An empty fragment parses the selector without matching anything.
        self.document
            .create_document_fragment()
            .query_selector(selector)
            .map(|_| ())
            .map_err(|_| Error::InvalidSelector(selector.to_owned()))
    }

    fn is_event_target(&self, target: &JsValue) -> bool {
        target.is_instance_of::<Node>()
            || target.is_instance_of::<Window>()
            || target.is_instance_of::<Document>()
    }

    fn is_callable(&self, listener: &JsValue) -> bool {
        listener.is_function()
    }
}
