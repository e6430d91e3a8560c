//! Observable application state cell.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::subscription::{ListenerRegistry, Subscription};

/// Name of an application-wide mode, e.g. `authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppState(String);

impl AppState {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppState {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for AppState {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Record delivered to subscribers on every `set_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub previous: AppState,
    pub current: AppState,
    /// Value of the transition counter after this transition.
    pub id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

type StateListener = dyn Fn(&StateTransition) + Send + Sync;

struct Current {
    state: AppState,
    id: u64,
}

/// Current application state plus a monotonically increasing transition counter.
///
/// Any state may follow any other. The counter advances on every
/// [`set_state`](Self::set_state), including same-value transitions, which
/// is what lets an in-flight navigation notice that the state moved under it.
pub struct StateMachine {
    current: Mutex<Current>,
    listeners: ListenerRegistry<StateListener>,
}

impl StateMachine {
    pub fn new(initial: impl Into<AppState>) -> Self {
        Self {
            current: Mutex::new(Current {
                state: initial.into(),
                id: 0,
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn state(&self) -> AppState {
        self.lock().state.clone()
    }

    pub fn state_id(&self) -> u64 {
        self.lock().id
    }

    /// Move to `next` and notify every subscriber synchronously.
    ///
    /// A panicking subscriber is logged and skipped; the others still run.
    pub fn set_state(&self, next: impl Into<AppState>) -> StateTransition {
        let next = next.into();
        let transition = {
            let mut current = self.lock();
            let previous = std::mem::replace(&mut current.state, next.clone());
            current.id += 1;
            StateTransition {
                previous,
                current: next,
                id: current.id,
                timestamp: now_millis(),
            }
        };

        tracing::debug!(
            previous = %transition.previous,
            current = %transition.current,
            state_id = transition.id,
            "App state changed"
        );
        metrics::record_state_transition();

        for listener in self.listeners.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(&transition)));
            if outcome.is_err() {
                tracing::error!(
                    state_id = transition.id,
                    "State subscriber panicked; continuing with remaining subscribers"
                );
            }
        }

        transition
    }

    /// Register a listener for state transitions.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateTransition) + Send + Sync + 'static,
    {
        self.listeners.register(Arc::new(listener))
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.lock();
        f.debug_struct("StateMachine")
            .field("state", &current.state)
            .field("state_id", &current.id)
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
