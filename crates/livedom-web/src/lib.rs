#![forbid(unsafe_code)]

//! Browser host for livedom.
//!
//! [`WebHost`] backs [`LiveQuery`](livedom_core::LiveQuery) with
//! `querySelectorAll`, a `MutationObserver` per running query, and
//! `addEventListener`. Nodes are `Element`s; listener targets and listeners
//! are plain `JsValue`s so that arguments coming straight from JavaScript can
//! be validated rather than rejected by the type system.
//!
//! Only compiled on `wasm32` targets.

pub use livedom_core::{
    Error, LifecycleEvent, ListenerOptions, LiveQuery, Mode, Notification, ObserverConfig, Update,
};

#[cfg(target_arch = "wasm32")]
mod host;

#[cfg(target_arch = "wasm32")]
pub use host::{WebHost, WebObservation};
