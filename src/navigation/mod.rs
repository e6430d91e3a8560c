//! Navigation subsystem.
//!
//! # Data Flow
//! ```text
//! navigate / navigate_after_state_change / handle_pop_state / initialize
//!     → navigator.rs (one pipeline, restartable on hook redirects)
//!         → RouteMatcher snapshot (routing/)
//!         → BlockerCheck (blockers.rs or host)
//!         → NavigationLifecycle (lifecycle/)
//!         → ComponentLoader + LayoutResolver
//!     → commit: RenderSink, PageState, HistoryProvider, StorageProvider
//! ```
//!
//! # Design Decisions
//! - Host capabilities are traits (providers.rs); in-memory versions ship
//!   alongside (memory.rs) so the pipeline runs headless
//! - Failures are typed values with stable codes (types.rs), never panics
//! - PageState is owned by the navigator and read as a snapshot

pub mod blockers;
pub mod memory;
pub mod navigator;
pub mod providers;
pub mod types;

pub use blockers::{AutoConfirm, BlockerRegistry};
pub use memory::{MemoryHistory, MemoryStorage};
pub use navigator::{Navigator, NavigatorBuilder};
pub use providers::{
    AllowAll, BlockerCheck, BlockerVerdict, ConfirmDialog, DefaultLayoutResolver,
    HistoryProvider, LayoutResolver, NavigationEvents, NoopEvents, NoopRender, OnBlocked,
    PopStateListener, RenderCommit, RenderSink, StorageProvider,
};
pub use types::{
    HistoryState, NavigateOptions, Navigated, NavigationError, NavigationErrorCode,
    NavigationResult, PageState, ScrollPosition, HISTORY_MARKER,
};
