//! State-aware client-side navigation router.
//!
//! Routes are grouped by application state ("unauthenticated",
//! "authenticated", ...). A path that exists only under another state is
//! never rendered in the wrong one; the navigator falls back to the current
//! state's default path and remembers where the user wanted to go.

pub mod config;
pub mod lifecycle;
pub mod navigation;
pub mod observability;
pub mod routing;
pub mod state;
pub mod subscription;

/// Opaque failure of a loader, hook, blocker or layout resolver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::RouterConfig;
pub use lifecycle::{GuardResult, NavigationContext, NavigationLifecycle};
pub use navigation::{NavigateOptions, Navigated, NavigationError, Navigator, PageState};
pub use routing::{ComponentLoader, Route, RouteMatcher, StateRoutes};
pub use state::{AppState, StateMachine};
pub use subscription::Subscription;
