//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at construction):
//!     StateRoutes[] (code) or RouterConfig (file) + ComponentRegistry
//!     → pattern.rs (regex, param names, specificity score)
//!     → sort each state by score, stable
//!     → Freeze as immutable RouteMatcher
//!
//! Lookup (per navigation attempt):
//!     pathname + current AppState
//!     → matcher.rs
//!     → Matched | Redirect | StateMismatch | None
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable afterwards
//! - Deterministic: same input always resolves to the same route
//! - Most specific route wins; literal segments outrank params
//! - Pattern errors are construction errors, never lookup errors

pub mod matcher;
pub mod pattern;
pub mod route;

pub use matcher::{
    normalize_path, CompiledRoute, MatchedRoute, RouteMatch, RouteMatcher, RouteTableError,
    StateMismatch,
};
pub use pattern::{compile, CompiledPattern, ParamSpec, PatternError, SegmentKind};
pub use route::{ComponentLoader, ComponentRegistry, LoadedComponent, Route, StateRoutes};
