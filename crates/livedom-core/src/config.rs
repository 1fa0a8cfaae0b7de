#![forbid(unsafe_code)]

//! Observation and listener configuration.
//!
//! With the `serde` feature enabled both types deserialize from partial
//! objects (camelCase keys, as the host APIs spell them); missing keys keep
//! their defaults.

/// Which classes of subtree change should trigger a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ObserverConfig {
    /// Insertions and removals of direct children.
    pub child_list: bool,
    /// Extend watching to every descendant of the parent.
    pub subtree: bool,
    /// Attribute changes.
    pub attributes: bool,
    /// Text content changes.
    pub character_data: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            child_list: true,
            subtree: true,
            attributes: false,
            character_data: false,
        }
    }
}

impl ObserverConfig {
    #[must_use]
    pub fn with_child_list(mut self, on: bool) -> Self {
        self.child_list = on;
        self
    }

    #[must_use]
    pub fn with_subtree(mut self, on: bool) -> Self {
        self.subtree = on;
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, on: bool) -> Self {
        self.attributes = on;
        self
    }

    #[must_use]
    pub fn with_character_data(mut self, on: bool) -> Self {
        self.character_data = on;
        self
    }

    /// True if at least one change class is watched.
    #[must_use]
    pub fn watches_anything(&self) -> bool {
        self.child_list || self.attributes || self.character_data
    }
}

/// Options passed through to the host when a listener is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
}

impl ListenerOptions {
    /// Options for a direct listener: only `passive` is configurable.
    #[must_use]
    pub fn direct(passive: bool) -> Self {
        Self {
            passive,
            ..Self::default()
        }
    }
}
