//! Navigation lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Navigator resolves a target
//!     → context.rs (NavigationContext snapshot)
//!     → hooks.rs run_before   (concurrent, may abort/redirect)
//!     → component load
//!     → hooks.rs run_on       (sequential, cannot abort)
//!     → commit
//!     → hooks.rs run_after    (synchronous, fire-and-forget)
//!
//! Hook failures:
//!     Err / panic → caught → diagnostics channel (tracing + listeners)
//! ```
//!
//! # Design Decisions
//! - Three phases, three execution disciplines over one context type
//! - Guard verdicts are an explicit enum, not truthiness
//! - Subscribe/unsubscribe mirrors the state machine

pub mod context;
pub mod hooks;

pub use context::{Location, NavigationContext, NavigationDirection, NavigationType};
pub use hooks::{GuardResult, HookFailure, HookPhase, NavigationLifecycle};
