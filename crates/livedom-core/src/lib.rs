#![forbid(unsafe_code)]

//! Live selector queries.
//!
//! A [`LiveQuery`] is a selector evaluated against a parent node that keeps
//! itself current as the tree under the parent changes. It also keeps two
//! kinds of listeners consistent with what it matches:
//!
//! - **direct** listeners, cascaded onto every matched node;
//! - **delegated** listeners, registered on outside targets (window,
//!   document, another node) and attached only while something is matched.
//!
//! The tree, selector engine, mutation notifications, and listener
//! primitives are supplied by a [`Host`]. `livedom-web` implements it for
//! browsers; `livedom-harness` implements it in memory for tests.
//!
//! # Example
//!
//! ```ignore
//! let rows = LiveQuery::collection(host, "tr.selected", Some(table), ObserverConfig::default())?;
//! rows.on(LifecycleEvent::Update, Rc::new(|n: &Notification<_>| {
//!     if let Some(update) = n.update() {
//!         tracing::info!(entered = update.entered().len(), left = update.left().len(), "selection changed");
//!     }
//! }));
//! rows.add_event_listener("click", on_row_click, false)?;
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod host;
mod listeners;
pub mod query;

pub use config::{ListenerOptions, ObserverConfig};
pub use diff::{Delta, diff_collection, diff_single};
pub use error::{Error, Result};
pub use event::{LifecycleEvent, Notification, Subscriber, Update};
pub use host::{Host, RefreshCallback};
pub use query::{LiveQuery, Mode};
