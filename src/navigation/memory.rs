//! In-process history and storage providers.
//!
//! Used by the `route-check` binary, by tests, and by hosts without a
//! browser history of their own.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::lifecycle::Location;
use crate::navigation::providers::{HistoryProvider, PopStateListener, StorageProvider};
use crate::navigation::types::{HistoryState, ScrollPosition};
use crate::subscription::{ListenerRegistry, Subscription};

#[derive(Debug, Clone)]
struct Entry {
    href: String,
    state: Option<HistoryState>,
}

#[derive(Debug)]
struct Stack {
    entries: Vec<Entry>,
    index: usize,
}

/// A history stack kept in memory.
///
/// `go` notifies pop-state listeners synchronously, after the stack lock is
/// released.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
    listeners: ListenerRegistry<PopStateListener>,
}

impl MemoryHistory {
    /// Start with a single entry at `initial` and no history state.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            stack: Mutex::new(Stack {
                entries: vec![Entry {
                    href: initial.into(),
                    state: None,
                }],
                index: 0,
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stack().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack().entries.is_empty()
    }

    /// Index of the current entry.
    pub fn index(&self) -> usize {
        self.stack().index
    }

    /// Every entry's href, oldest first.
    pub fn hrefs(&self) -> Vec<String> {
        self.stack().entries.iter().map(|e| e.href.clone()).collect()
    }

    fn stack(&self) -> MutexGuard<'_, Stack> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl HistoryProvider for MemoryHistory {
    fn location(&self) -> Location {
        let href = {
            let stack = self.stack();
            stack.entries[stack.index].href.clone()
        };
        Location::parse(&href).unwrap_or_default()
    }

    fn push(&self, href: &str, state: HistoryState) {
        let mut stack = self.stack();
        let next = stack.index + 1;
        stack.entries.truncate(next);
        stack.entries.push(Entry {
            href: href.to_string(),
            state: Some(state),
        });
        stack.index = next;
    }

    fn replace(&self, href: &str, state: HistoryState) {
        let mut stack = self.stack();
        let index = stack.index;
        stack.entries[index] = Entry {
            href: href.to_string(),
            state: Some(state),
        };
    }

    fn go(&self, delta: i64) {
        let state = {
            let mut stack = self.stack();
            let last = stack.entries.len() as i64 - 1;
            let target = (stack.index as i64 + delta).clamp(0, last) as usize;
            if target == stack.index {
                return;
            }
            stack.index = target;
            stack.entries[target].state.clone()
        };

        for listener in self.listeners.snapshot() {
            listener(state.clone());
        }
    }

    fn history_state(&self) -> Option<HistoryState> {
        let stack = self.stack();
        stack.entries[stack.index].state.clone()
    }

    fn on_pop_state(&self, listener: Box<PopStateListener>) -> Subscription {
        self.listeners.register(Arc::from(listener))
    }
}

#[derive(Debug)]
struct ScrollCache {
    capacity: usize,
    order: VecDeque<u64>,
    positions: HashMap<u64, ScrollPosition>,
}

impl ScrollCache {
    fn touch(&mut self, navigation_id: u64) {
        if let Some(at) = self.order.iter().position(|id| *id == navigation_id) {
            self.order.remove(at);
        }
        self.order.push_back(navigation_id);
    }
}

/// Session storage kept in memory.
///
/// Scroll positions are an LRU cache bounded by `capacity`; the least
/// recently saved or read entry is evicted first.
#[derive(Debug)]
pub struct MemoryStorage {
    scroll: Mutex<ScrollCache>,
    intended_path: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            scroll: Mutex::new(ScrollCache {
                capacity: capacity.max(1),
                order: VecDeque::new(),
                positions: HashMap::new(),
            }),
            intended_path: Mutex::new(None),
        }
    }

    /// Number of cached scroll positions.
    pub fn scroll_entries(&self) -> usize {
        self.scroll
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .positions
            .len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(50)
    }
}

impl StorageProvider for MemoryStorage {
    fn save_scroll_position(&self, navigation_id: u64, position: ScrollPosition) {
        let mut cache = self.scroll.lock().unwrap_or_else(PoisonError::into_inner);
        cache.touch(navigation_id);
        cache.positions.insert(navigation_id, position);
        while cache.positions.len() > cache.capacity {
            match cache.order.pop_front() {
                Some(evicted) => {
                    cache.positions.remove(&evicted);
                }
                None => break,
            }
        }
    }

    fn scroll_position(&self, navigation_id: u64) -> Option<ScrollPosition> {
        let mut cache = self.scroll.lock().unwrap_or_else(PoisonError::into_inner);
        let position = cache.positions.get(&navigation_id).copied()?;
        cache.touch(navigation_id);
        Some(position)
    }

    fn save_intended_path(&self, path: &str) {
        *self
            .intended_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
    }

    fn pop_intended_path(&self) -> Option<String> {
        self.intended_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
