#![forbid(unsafe_code)]

//! Test harness for livedom.
//!
//! - [`FakeHost`]: an in-memory [`Host`](livedom_core::Host) with a tiny
//!   selector engine, manually flushed mutation batches, and a listener
//!   ledger that can be inspected.
//! - [`Recorder`]: a lifecycle subscriber that keeps every notification.
//!
//! End-to-end and property suites live in this crate's `tests/` directory.

pub mod fake_dom;
pub mod recorder;
pub mod selector;

pub use fake_dom::{FakeHost, FakeListener, FakeObservation, FakeTarget, HostStats, NodeId, Registration};
pub use recorder::Recorder;
pub use selector::{Compound, Selector, SelectorError};
