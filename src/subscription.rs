//! Instance-owned listener registries.
//!
//! # Responsibilities
//! - Hold an ordered list of listeners for one owner (state machine, hook
//!   phase, history provider)
//! - Hand out [`Subscription`] handles that remove exactly one registration
//! - Snapshot listeners so callbacks run without the registry lock held
//!
//! # Design Decisions
//! - Registering the same callback twice yields two independent entries
//! - Notification order is registration order
//! - Handles hold a weak reference; unsubscribing after the owner is gone is a no-op

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

struct Entries<F: ?Sized> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Arc<F>)>>,
}

impl<F: ?Sized + Send + Sync> Detach for Entries<F> {
    fn detach(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(entry_id, _)| *entry_id != id);
        listeners.len() != before
    }
}

/// An ordered collection of listeners of type `F` (usually a `dyn Fn` type).
pub struct ListenerRegistry<F: ?Sized> {
    entries: Arc<Entries<F>>,
}

impl<F: ?Sized + Send + Sync + 'static> ListenerRegistry<F> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Entries {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener and return the handle that removes it.
    pub fn register(&self, listener: Arc<F>) -> Subscription {
        let id = self.entries.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));

        let weak: Weak<Entries<F>> = Arc::downgrade(&self.entries);
        let owner: Weak<dyn Detach> = weak;
        Subscription { id, owner }
    }

    /// Current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F: ?Sized + Send + Sync + 'static> Default for ListenerRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> std::fmt::Debug for ListenerRegistry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .entries
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &count)
            .finish()
    }
}

/// Handle returned by every `subscribe`/`on_*` registration.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    id: u64,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    /// Remove the listener. Returns false if it was already removed or the
    /// owning registry no longer exists.
    pub fn unsubscribe(self) -> bool {
        match self.owner.upgrade() {
            Some(owner) => owner.detach(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
