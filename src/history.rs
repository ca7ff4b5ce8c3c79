//! Location/history abstraction.
//!
//! The router never touches a real location bar. It talks to a [`History`]
//! implementation that records fragments, per-entry state, the document title
//! and the last known-good location used for recovery.
//!
//! [`MemoryHistory`] is the in-process implementation: an entry stack with a
//! cursor, like a browser session history. It is what tests and headless
//! hosts use.

use crate::url::{fragment_of, is_absolute_url};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// Options accepted by every navigation entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Run the navigation pipeline after updating the location.
    pub trigger: bool,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    /// For navigation commands: navigate through the app router rather than
    /// the router the command was bound to.
    pub use_app_router: bool,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            trigger: true,
            replace: false,
            use_app_router: false,
        }
    }
}

impl NavigationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(mut self, trigger: bool) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn use_app_router(mut self, use_app_router: bool) -> Self {
        self.use_app_router = use_app_router;
        self
    }
}

/// What the router needs from a location/history backend.
pub trait History {
    /// Start tracking the location.
    fn activate(&self) {}

    fn deactivate(&self) {}

    /// Record a new location. Returns `false` when nothing changed (same
    /// fragment without `replace`, or an inactive history).
    fn navigate(&self, url: &str, options: &NavigationOptions) -> bool;

    /// Step back one entry and return the fragment now current.
    fn navigate_back(&self) -> Option<String>;

    /// The current fragment, without `#` or leading slash.
    fn fragment(&self) -> String;

    fn set_state(&self, key: &str, value: String);

    fn get_state(&self, key: &str) -> Option<String>;

    fn set_title(&self, title: &str);

    /// Scheme, host and root path used for absolute URL generation.
    fn get_absolute_root(&self) -> String;

    /// Last location a navigation succeeded at.
    fn previous_location(&self) -> Option<String>;

    fn set_previous_location(&self, location: Option<String>);

    /// `true` when URLs are path-rooted rather than hash-prefixed.
    fn has_push_state(&self) -> bool;
}

// ============================================================================
// MemoryHistory
// ============================================================================

#[derive(Debug, Clone, Default)]
struct HistoryEntry {
    fragment: String,
    state: BTreeMap<String, String>,
}

#[derive(Debug)]
struct MemoryHistoryState {
    entries: Vec<HistoryEntry>,
    current: usize,
    title: String,
    previous_location: Option<String>,
    active: bool,
    push_state: bool,
    absolute_root: String,
    external: Vec<String>,
}

/// In-memory [`History`].
///
/// ```
/// use navigator_pipeline::{History, MemoryHistory, NavigationOptions};
///
/// let history = MemoryHistory::new();
/// history.activate();
/// assert!(history.navigate("#/users", &NavigationOptions::default()));
/// assert!(!history.navigate("#/users", &NavigationOptions::default()));
/// assert_eq!(history.fragment(), "users");
/// assert_eq!(history.navigate_back().as_deref(), Some(""));
/// ```
pub struct MemoryHistory {
    state: RefCell<MemoryHistoryState>,
}

impl MemoryHistory {
    /// Hash-based history starting at the empty fragment.
    pub fn new() -> Self {
        Self::starting_at("")
    }

    /// Hash-based history whose first entry is `fragment`.
    pub fn starting_at(fragment: &str) -> Self {
        Self {
            state: RefCell::new(MemoryHistoryState {
                entries: vec![HistoryEntry {
                    fragment: fragment_of(fragment),
                    state: BTreeMap::new(),
                }],
                current: 0,
                title: String::new(),
                previous_location: None,
                active: false,
                push_state: false,
                absolute_root: "http://localhost/".to_string(),
                external: Vec::new(),
            }),
        }
    }

    /// Switch to path-rooted (push-state) URLs.
    pub fn with_push_state(self, push_state: bool) -> Self {
        self.state.borrow_mut().push_state = push_state;
        self
    }

    pub fn with_absolute_root(self, root: impl Into<String>) -> Self {
        self.state.borrow_mut().absolute_root = root.into();
        self
    }

    /// Step forward one entry and return the fragment now current.
    pub fn navigate_forward(&self) -> Option<String> {
        let mut state = self.state.borrow_mut();
        if state.current + 1 < state.entries.len() {
            state.current += 1;
            Some(state.entries[state.current].fragment.clone())
        } else {
            None
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.state.borrow().current > 0
    }

    pub fn can_go_forward(&self) -> bool {
        let state = self.state.borrow();
        state.current + 1 < state.entries.len()
    }

    /// Fragments of every entry, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|e| e.fragment.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn title(&self) -> String {
        self.state.borrow().title.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    /// Absolute URLs handed to `navigate`, which leave the app.
    pub fn external_navigations(&self) -> Vec<String> {
        self.state.borrow().external.clone()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl History for MemoryHistory {
    fn activate(&self) {
        self.state.borrow_mut().active = true;
    }

    fn deactivate(&self) {
        self.state.borrow_mut().active = false;
    }

    fn navigate(&self, url: &str, options: &NavigationOptions) -> bool {
        let mut state = self.state.borrow_mut();

        if is_absolute_url(url) {
            state.external.push(url.to_string());
            return true;
        }
        if !state.active {
            return false;
        }

        let fragment = fragment_of(url);
        let current = state.current;
        if state.entries[current].fragment == fragment && !options.replace {
            return false;
        }

        let entry = HistoryEntry {
            fragment,
            state: BTreeMap::new(),
        };
        if options.replace {
            state.entries[current] = entry;
        } else {
            state.entries.truncate(current + 1);
            state.entries.push(entry);
            state.current += 1;
        }
        true
    }

    fn navigate_back(&self) -> Option<String> {
        let mut state = self.state.borrow_mut();
        if state.current > 0 {
            state.current -= 1;
            Some(state.entries[state.current].fragment.clone())
        } else {
            None
        }
    }

    fn fragment(&self) -> String {
        let state = self.state.borrow();
        state.entries[state.current].fragment.clone()
    }

    fn set_state(&self, key: &str, value: String) {
        let mut state = self.state.borrow_mut();
        let current = state.current;
        state.entries[current].state.insert(key.to_string(), value);
    }

    fn get_state(&self, key: &str) -> Option<String> {
        let state = self.state.borrow();
        state.entries[state.current].state.get(key).cloned()
    }

    fn set_title(&self, title: &str) {
        self.state.borrow_mut().title = title.to_string();
    }

    fn get_absolute_root(&self) -> String {
        self.state.borrow().absolute_root.clone()
    }

    fn previous_location(&self) -> Option<String> {
        self.state.borrow().previous_location.clone()
    }

    fn set_previous_location(&self, location: Option<String>) {
        self.state.borrow_mut().previous_location = location;
    }

    fn has_push_state(&self) -> bool {
        self.state.borrow().push_state
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryHistory")
            .field("entries", &state.entries.len())
            .field("current", &state.current)
            .field("active", &state.active)
            .field("push_state", &state.push_state)
            .finish_non_exhaustive()
    }
}
