#![forbid(unsafe_code)]

//! Matched-set reconciliation.
//!
//! Both diffs compare nodes by identity (`PartialEq` on host node handles is
//! identity for every host this crate ships with).
//!
//! # Performance
//!
//! | Operation          | Complexity        |
//! |--------------------|-------------------|
//! | `diff_collection`  | O(P × S)          |
//! | `diff_single`      | O(1)              |
//!
//! Host node handles are not `Hash`, so the collection diff is a pair of
//! linear scans. Matched sets are expected to stay in the hundreds.

/// Nodes that entered and left a matched set between two refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<N> {
    /// In `selected` but not in `previous`, in `selected` order.
    pub entered: Vec<N>,
    /// In `previous` but not in `selected`, in `previous` order.
    pub left: Vec<N>,
}

impl<N> Delta<N> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// Diff two ordered matched sets.
///
/// The two scans run over different sources and each keeps its own source's
/// order, so they are computed independently.
#[must_use]
pub fn diff_collection<N: Clone + PartialEq>(previous: &[N], selected: &[N]) -> Delta<N> {
    let entered = selected
        .iter()
        .filter(|node| !previous.contains(node))
        .cloned()
        .collect();
    let left = previous
        .iter()
        .filter(|node| !selected.contains(node))
        .cloned()
        .collect();
    Delta { entered, left }
}

/// True if the single match changed.
#[must_use]
pub fn diff_single<N: PartialEq>(previous: Option<&N>, selected: Option<&N>) -> bool {
    previous != selected
}
